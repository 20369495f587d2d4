use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::ir::Language;
use crate::parser::ParseLimits;
use crate::rules::policy::Policy;

/// File name looked up in the scan root when no config path is given.
pub const CONFIG_FILE_NAME: &str = ".sastline.toml";

/// Upper bound for `max_ast_depth`; worker stacks are sized to fit it.
pub const MAX_AST_DEPTH_LIMIT: usize = 2048;

/// Top-level configuration from `.sastline.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub policy: Policy,
}

/// `[scan]` table: engine limits, discovery filters and catalog pinning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Worker threads; 0 uses every available core.
    pub threads: usize,
    pub max_file_bytes: usize,
    pub max_ast_depth: usize,
    pub parse_timeout_ms_per_kib: u64,
    /// Glob patterns excluded from discovery.
    pub exclude: Vec<String>,
    /// Languages to scan; empty means every supported language.
    pub languages: Vec<Language>,
    /// Semver requirement the built-in rule catalog must satisfy.
    pub catalog_version: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let limits = ParseLimits::default();
        Self {
            threads: 0,
            max_file_bytes: limits.max_bytes,
            max_ast_depth: limits.max_depth,
            parse_timeout_ms_per_kib: limits.timeout_ms_per_kib,
            exclude: vec!["**/node_modules/**".into(), "**/dist/**".into()],
            languages: Vec::new(),
            catalog_version: ">=0.1".into(),
        }
    }
}

impl ScanConfig {
    pub fn limits(&self) -> ParseLimits {
        ParseLimits {
            max_bytes: self.max_file_bytes,
            max_depth: self.max_ast_depth,
            timeout_ms_per_kib: self.parse_timeout_ms_per_kib,
        }
    }

    /// Reject limits the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.max_file_bytes == 0 || self.max_ast_depth == 0 {
            return Err(EngineError::Config(
                "max_file_bytes and max_ast_depth must be positive".into(),
            ));
        }
        if self.max_ast_depth > MAX_AST_DEPTH_LIMIT {
            return Err(EngineError::Config(format!(
                "max_ast_depth {} exceeds the supported maximum of {MAX_AST_DEPTH_LIMIT}",
                self.max_ast_depth
            )));
        }
        Ok(())
    }

    /// Whether files of `language` take part in the scan.
    pub fn wants(&self, language: Language) -> bool {
        language != Language::Unknown
            && (self.languages.is_empty() || self.languages.contains(&language))
    }
}

impl Config {
    /// Load config from a TOML file. Returns default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.scan.validate().map_err(|e| match e {
            EngineError::Config(message) => {
                EngineError::Config(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;
        Ok(config)
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# sastline configuration

[scan]
# Worker threads; 0 uses every available core.
threads = 0
# Files above this size are reported and skipped.
max_file_bytes = 1048576
# Deeper syntax trees are rejected instead of overflowing the stack (at most 2048).
max_ast_depth = 512
# Parser time budget per KiB of input (minimum 100 ms per file).
parse_timeout_ms_per_kib = 50
exclude = ["**/node_modules/**", "**/dist/**"]
# Empty means every supported language: javascript, typescript, tsx, python, java.
languages = []
# Semver requirement on the built-in rule catalog.
catalog_version = ">=0.1"

[policy]
# Minimum severity to fail the scan (info, low, medium, high, critical).
fail_on = "high"

# Rule ids or finding codes to ignore entirely.
# ignore_rules = ["f091.log_injection", "F097"]

# Per-rule severity overrides.
# [policy.overrides]
# "f052.insecure_hash" = "low"
"#
    }
}
