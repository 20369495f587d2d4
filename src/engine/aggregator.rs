use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::evaluator::{FileEvaluation, FileStatus};
use crate::ir::SourceLocation;
use crate::rules::Finding;

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The file could not be parsed; it produced no findings.
    Parse,
    /// The parser recovered from syntax errors; findings come from a partial tree.
    SyntaxRecovered,
    /// One rule failed on one file.
    Rule,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse => write!(f, "parse"),
            Self::SyntaxRecovered => write!(f, "syntax-recovered"),
            Self::Rule => write!(f, "rule"),
        }
    }
}

/// Non-fatal problem recorded beside the findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: PathBuf,
    pub kind: DiagnosticKind,
    pub rule_id: Option<String>,
    pub location: Option<SourceLocation>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Files parsed and evaluated, including those with recovered syntax errors.
    pub files_scanned: usize,
    /// Files rejected by their adapter.
    pub files_failed: usize,
    /// Scanned files whose tree contains error-recovery nodes.
    pub files_recovered: usize,
    /// Files never started because the scan was cancelled.
    pub files_skipped: usize,
    /// Rule runs across all files, failed runs included.
    pub rules_evaluated: usize,
    pub findings: usize,
}

/// Result of one scan: findings and diagnostics in their final order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub findings: Vec<Finding>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: ScanStats,
    pub cancelled: bool,
}

/// Collects per-file results in any order and produces a deterministic
/// [`Report`].
#[derive(Debug, Default)]
pub struct Aggregator {
    findings: Vec<Finding>,
    diagnostics: Vec<Diagnostic>,
    stats: ScanStats,
    cancelled: bool,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, evaluation: FileEvaluation) {
        match evaluation.status {
            FileStatus::Scanned => self.stats.files_scanned += 1,
            FileStatus::Recovered => {
                self.stats.files_scanned += 1;
                self.stats.files_recovered += 1;
            }
            FileStatus::Failed => self.stats.files_failed += 1,
            FileStatus::Skipped => self.stats.files_skipped += 1,
        }
        self.stats.rules_evaluated += evaluation.rules_evaluated;
        self.findings.extend(evaluation.findings);
        self.diagnostics.extend(evaluation.diagnostics);
    }

    pub fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }

    /// Deduplicate and sort. Findings are ordered by file, start line, start
    /// column, then rule id; identical (rule, file, span) triples collapse.
    /// Diagnostics are ordered by file, kind, rule id, location and message.
    pub fn finish(mut self) -> Report {
        self.findings.sort_by(|a, b| {
            let key = |f: &Finding| {
                (
                    f.location.file.clone(),
                    f.location.line,
                    f.location.column,
                    f.rule_id.clone(),
                    f.location.end_line,
                    f.location.end_column,
                )
            };
            key(a)
                .cmp(&key(b))
                .then_with(|| a.message.cmp(&b.message))
        });
        self.findings
            .dedup_by(|b, a| a.rule_id == b.rule_id && a.location == b.location);

        self.diagnostics.sort_by(|a, b| {
            (&a.file, a.kind, &a.rule_id, &a.location, &a.message).cmp(&(
                &b.file,
                b.kind,
                &b.rule_id,
                &b.location,
                &b.message,
            ))
        });
        self.diagnostics.dedup();

        self.stats.findings = self.findings.len();
        Report {
            findings: self.findings,
            diagnostics: self.diagnostics,
            stats: self.stats,
            cancelled: self.cancelled,
        }
    }
}
