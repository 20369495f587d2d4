use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use tracing::warn;

use super::aggregator::{Diagnostic, DiagnosticKind};
use crate::error::RuleEvaluationError;
use crate::ir::{SourceFile, SourceLocation, Span};
use crate::parser::ParseOutcome;
use crate::rules::{CatalogEntry, Finding, MatchSite, RuleContext};

/// Longest snippet kept on a finding, in characters.
const MAX_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Scanned,
    /// Scanned from a tree with error-recovery nodes.
    Recovered,
    /// Rejected by the adapter; no findings.
    Failed,
    /// Not started because the scan was cancelled.
    Skipped,
}

/// Everything one file contributed to a scan.
#[derive(Debug, Clone)]
pub struct FileEvaluation {
    pub path: PathBuf,
    pub status: FileStatus,
    pub findings: Vec<Finding>,
    pub diagnostics: Vec<Diagnostic>,
    pub rules_evaluated: usize,
}

impl FileEvaluation {
    pub fn skipped(path: PathBuf) -> Self {
        Self {
            path,
            status: FileStatus::Skipped,
            findings: Vec::new(),
            diagnostics: Vec::new(),
            rules_evaluated: 0,
        }
    }

    pub fn failed(path: PathBuf, diagnostic: Diagnostic) -> Self {
        Self {
            path,
            status: FileStatus::Failed,
            findings: Vec::new(),
            diagnostics: vec![diagnostic],
            rules_evaluated: 0,
        }
    }
}

/// Run every rule in `rules` over one parsed file.
///
/// Rules are isolated from each other: a rule that panics is recorded as a
/// [`DiagnosticKind::Rule`] diagnostic and the remaining rules still run.
pub fn evaluate(file: &SourceFile, outcome: &ParseOutcome, rules: &[&CatalogEntry]) -> FileEvaluation {
    let ctx = RuleContext::new(file, &outcome.ast, &outcome.symbols);
    let mut findings = Vec::new();
    let mut diagnostics = Vec::new();

    if let Some(first) = outcome.syntax_errors.first() {
        diagnostics.push(Diagnostic {
            file: file.path.clone(),
            kind: DiagnosticKind::SyntaxRecovered,
            rule_id: None,
            location: Some(SourceLocation::from_span(file.path.clone(), first)),
            message: format!(
                "{} syntax error(s) recovered; findings come from a partial tree",
                outcome.syntax_errors.len()
            ),
        });
    }

    for entry in rules {
        let meta = &entry.metadata;
        match catch_unwind(AssertUnwindSafe(|| entry.rule.check(&ctx))) {
            Ok(sites) => {
                findings.extend(sites.into_iter().map(|site| to_finding(file, entry, site)));
            }
            Err(payload) => {
                let error = RuleEvaluationError {
                    rule_id: meta.id.clone(),
                    file: file.path.display().to_string(),
                    message: panic_message(payload.as_ref()),
                };
                warn!(file = %file.path.display(), rule_id = %meta.id, error = %error, "rule panicked");
                diagnostics.push(Diagnostic {
                    file: file.path.clone(),
                    kind: DiagnosticKind::Rule,
                    rule_id: Some(meta.id.clone()),
                    location: None,
                    message: error.to_string(),
                });
            }
        }
    }

    FileEvaluation {
        path: file.path.clone(),
        status: if outcome.syntax_errors.is_empty() {
            FileStatus::Scanned
        } else {
            FileStatus::Recovered
        },
        findings,
        diagnostics,
        rules_evaluated: rules.len(),
    }
}

fn to_finding(file: &SourceFile, entry: &CatalogEntry, site: MatchSite) -> Finding {
    let meta = &entry.metadata;
    let location = SourceLocation::from_span(file.path.clone(), &site.span);
    let snippet = snippet(file, &site.span);
    Finding {
        fingerprint: Finding::compute_fingerprint(&meta.id, &location, snippet.as_deref()),
        rule_id: meta.id.clone(),
        finding: meta.finding.clone(),
        rule_name: meta.name.clone(),
        severity: meta.default_severity,
        message: site.message,
        location,
        snippet,
        note: site.note,
        cwe_id: meta.cwe_id.clone(),
        remediation: meta.remediation.clone(),
    }
}

/// Trimmed source line where a match starts.
fn snippet(file: &SourceFile, span: &Span) -> Option<String> {
    let line = file.line(span.start_line)?.trim();
    if line.is_empty() {
        return None;
    }
    Some(line.chars().take(MAX_SNIPPET_CHARS).collect())
}

/// Text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic without message".to_string()
    }
}

#[cfg(all(test, feature = "javascript"))]
mod tests {
    use super::*;
    use crate::ir::Language;
    use crate::parser::{AdapterRegistry, ParseLimits};
    use crate::rules::{Rule, RuleMetadata, Severity};

    struct Panics;

    impl Rule for Panics {
        fn metadata(&self) -> RuleMetadata {
            RuleMetadata {
                id: "f000.panics".into(),
                finding: "F000".into(),
                name: "Panics".into(),
                description: "always panics".into(),
                default_severity: Severity::Info,
                cwe_id: None,
                languages: vec![Language::JavaScript],
                remediation: None,
            }
        }

        fn check(&self, _ctx: &RuleContext<'_>) -> Vec<MatchSite> {
            panic!("unexpected tree shape")
        }
    }

    /// Flags every call, so one node can match several rules.
    struct EveryCall(&'static str);

    impl Rule for EveryCall {
        fn metadata(&self) -> RuleMetadata {
            RuleMetadata {
                id: self.0.into(),
                finding: "F000".into(),
                name: "Every call".into(),
                description: "flags calls".into(),
                default_severity: Severity::Low,
                cwe_id: None,
                languages: vec![Language::JavaScript],
                remediation: None,
            }
        }

        fn check(&self, ctx: &RuleContext<'_>) -> Vec<MatchSite> {
            ctx.calls()
                .into_iter()
                .map(|c| MatchSite::new(c.span, "call"))
                .collect()
        }
    }

    fn entry(rule: Box<dyn Rule>) -> CatalogEntry {
        CatalogEntry {
            metadata: rule.metadata(),
            rule,
        }
    }

    fn parse(src: &str) -> (SourceFile, ParseOutcome) {
        let outcome = AdapterRegistry::builtin()
            .get(Language::JavaScript)
            .unwrap()
            .parse(src.as_bytes(), &ParseLimits::default())
            .unwrap();
        let file = SourceFile::new(PathBuf::from("app.js"), Language::JavaScript, src.into());
        (file, outcome)
    }

    #[test]
    fn panicking_rule_becomes_a_diagnostic() {
        let (file, outcome) = parse("    run(a);\n");
        let entries = [entry(Box::new(Panics)), entry(Box::new(EveryCall("f000.a")))];
        let refs: Vec<&CatalogEntry> = entries.iter().collect();
        let eval = evaluate(&file, &outcome, &refs);

        assert_eq!(eval.status, FileStatus::Scanned);
        assert_eq!(eval.rules_evaluated, 2);
        assert_eq!(eval.findings.len(), 1);
        assert_eq!(eval.findings[0].snippet.as_deref(), Some("run(a);"));
        assert_eq!(eval.diagnostics.len(), 1);
        assert_eq!(eval.diagnostics[0].kind, DiagnosticKind::Rule);
        assert_eq!(eval.diagnostics[0].rule_id.as_deref(), Some("f000.panics"));
        assert!(eval.diagnostics[0].message.contains("unexpected tree shape"));
    }

    #[test]
    fn one_node_may_match_several_rules() {
        let (file, outcome) = parse("run(a);\n");
        let entries = [
            entry(Box::new(EveryCall("f000.a"))),
            entry(Box::new(EveryCall("f000.b"))),
        ];
        let refs: Vec<&CatalogEntry> = entries.iter().collect();
        let eval = evaluate(&file, &outcome, &refs);
        let ids: Vec<&str> = eval.findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["f000.a", "f000.b"]);
        assert_eq!(eval.findings[0].location, eval.findings[1].location);
    }

    #[test]
    fn recovered_syntax_is_reported_once() {
        let (file, outcome) = parse("run(a);\nconst s = 'unterminated;\nrun(b);\n");
        let entries = [entry(Box::new(EveryCall("f000.a")))];
        let refs: Vec<&CatalogEntry> = entries.iter().collect();
        let eval = evaluate(&file, &outcome, &refs);
        assert_eq!(eval.status, FileStatus::Recovered);
        let recovered: Vec<_> = eval
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::SyntaxRecovered)
            .collect();
        assert_eq!(recovered.len(), 1);
        assert!(!eval.findings.is_empty());
    }

    #[test]
    fn snippets_are_truncated() {
        let long = format!("run('{}');\n", "x".repeat(400));
        let (file, outcome) = parse(&long);
        let entries = [entry(Box::new(EveryCall("f000.a")))];
        let refs: Vec<&CatalogEntry> = entries.iter().collect();
        let eval = evaluate(&file, &outcome, &refs);
        assert_eq!(
            eval.findings[0].snippet.as_ref().map(|s| s.chars().count()),
            Some(MAX_SNIPPET_CHARS)
        );
    }
}
