use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ir::{Language, SourceLocation, Span};

/// A security finding produced by a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Unique rule identifier (e.g., "f097.window_open_tabnabbing").
    pub rule_id: String,
    /// Vulnerability class the rule reports under (e.g., "F097").
    pub finding: String,
    /// Human-readable rule name.
    pub rule_name: String,
    pub severity: Severity,
    /// Human-readable description of this match.
    pub message: String,
    pub location: SourceLocation,
    /// Source text of the first matched line.
    pub snippet: Option<String>,
    /// Extra detail captured by the rule (resolved algorithm, header name).
    pub note: Option<String>,
    pub cwe_id: Option<String>,
    pub remediation: Option<String>,
    /// Stable identity across runs.
    pub fingerprint: String,
}

impl Finding {
    /// SHA-256 over rule id, path, span and snippet.
    pub fn compute_fingerprint(
        rule_id: &str,
        location: &SourceLocation,
        snippet: Option<&str>,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(rule_id.as_bytes());
        hasher.update(b"|");
        hasher.update(location.file.to_string_lossy().as_bytes());
        hasher.update(
            format!(
                "|{}:{}-{}:{}|",
                location.line, location.column, location.end_line, location.end_column
            )
            .as_bytes(),
        );
        hasher.update(snippet.unwrap_or("").as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Short title in the catalog's numbering, e.g. `F052. Insecure cipher mode`.
    pub fn title(&self) -> String {
        format!("{}. {}", self.finding, self.rule_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// One place a rule matched, before it is turned into a [`Finding`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSite {
    pub span: Span,
    pub message: String,
    pub note: Option<String>,
}

impl MatchSite {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Metadata about a rule, used for `list-rules` output and reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMetadata {
    pub id: String,
    pub finding: String,
    pub name: String,
    pub description: String,
    pub default_severity: Severity,
    pub cwe_id: Option<String>,
    pub languages: Vec<Language>,
    pub remediation: Option<String>,
}

impl RuleMetadata {
    pub fn applies_to(&self, language: Language) -> bool {
        self.languages.contains(&language)
    }
}
