//! Unified intermediate representation shared by every language adapter.
//!
//! Adapters lower their native syntax trees into an [`ast::Ast`]; rules only
//! ever see this model plus the def-use [`symbols::SymbolTable`] built from it.

pub mod ast;
pub mod symbols;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

pub use ast::{Ast, AstNode, NodeId, NodeKind, Role, Span};
pub use symbols::{Binding, BindingKind, ScopeId, SymbolTable};

/// A decoded source file. Immutable once read; lives for one scan pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub language: Language,
    pub content: String,
    pub size_bytes: u64,
    pub content_hash: String,
}

impl SourceFile {
    pub fn new(path: PathBuf, language: Language, content: String) -> Self {
        let content_hash = hex::encode(Sha256::digest(content.as_bytes()));
        Self {
            path,
            language,
            size_bytes: content.len() as u64,
            content_hash,
            content,
        }
    }

    /// Text of a 1-indexed line, without its terminator.
    pub fn line(&self, line: usize) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.content
            .lines()
            .nth(line - 1)
            .map(|l| l.trim_end_matches('\r'))
    }

    /// Source text covered by a span.
    pub fn text(&self, span: &Span) -> &str {
        self.content
            .get(span.start_byte..span.end_byte)
            .unwrap_or("")
    }
}

/// Programming language of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Tsx,
    Python,
    Java,
    Unknown,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Self::JavaScript,
        Self::TypeScript,
        Self::Tsx,
        Self::Python,
        Self::Java,
    ];

    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "jsx" | "mjs" | "cjs" => Self::JavaScript,
            "ts" | "mts" | "cts" => Self::TypeScript,
            "tsx" => Self::Tsx,
            "py" => Self::Python,
            "java" => Self::Java,
            _ => Self::Unknown,
        }
    }

    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "javascript" | "js" | "jsx" => Some(Self::JavaScript),
            "typescript" | "ts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "python" | "py" => Some(Self::Python),
            "java" => Some(Self::Java),
            _ => None,
        }
    }

    /// JavaScript and its TypeScript supersets share rule semantics.
    pub fn is_ecmascript(&self) -> bool {
        matches!(self, Self::JavaScript | Self::TypeScript | Self::Tsx)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JavaScript => write!(f, "javascript"),
            Self::TypeScript => write!(f, "typescript"),
            Self::Tsx => write!(f, "tsx"),
            Self::Python => write!(f, "python"),
            Self::Java => write!(f, "java"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Location in source code, as reported to users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl SourceLocation {
    pub fn from_span(file: PathBuf, span: &Span) -> Self {
        Self {
            file,
            line: span.start_line,
            column: span.start_column,
            end_line: span.end_line,
            end_column: span.end_column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mapping() {
        assert_eq!(Language::from_extension("JSX"), Language::JavaScript);
        assert_eq!(Language::from_extension("mts"), Language::TypeScript);
        assert_eq!(Language::from_extension("tsx"), Language::Tsx);
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("java"), Language::Java);
        assert_eq!(Language::from_extension("rb"), Language::Unknown);
    }

    #[test]
    fn source_line_lookup() {
        let file = SourceFile::new(
            PathBuf::from("a.js"),
            Language::JavaScript,
            "first\r\nsecond\nthird".into(),
        );
        assert_eq!(file.line(1), Some("first"));
        assert_eq!(file.line(3), Some("third"));
        assert_eq!(file.line(0), None);
        assert_eq!(file.line(4), None);
    }
}
