use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ir::Language;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Fatal errors. Only these abort a scan; everything file- or rule-scoped is
/// reported through the report's diagnostics instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Rule catalog error: {0}")]
    Catalog(String),

    #[error("Duplicate rule id in catalog: {0}")]
    DuplicateRule(String),

    #[error("No parser adapter available for language: {0}")]
    NoAdapter(Language),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// File-scoped parse failure. The file yields no findings; the scan goes on.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParseError {
    #[error("content is not valid UTF-8 (first invalid byte at offset {offset})")]
    Encoding { offset: usize },

    #[error("syntax tree nesting exceeds {limit} levels at byte offset {offset}")]
    DepthExceeded { limit: usize, offset: usize },

    #[error("file is {size} bytes, above the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("parser gave up after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("failed to load grammar: {message}")]
    Grammar { message: String },

    #[error("adapter panicked: {message}")]
    AdapterPanic { message: String },
}

impl ParseError {
    /// Byte offset the error points at, when it has one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Encoding { offset } | Self::DepthExceeded { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

/// Rule-scoped failure: one rule could not evaluate one file.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("rule {rule_id} failed on {file}: {message}")]
pub struct RuleEvaluationError {
    pub rule_id: String,
    pub file: String,
    pub message: String,
}
