//! Scan driver: parses and evaluates inputs on a worker pool and aggregates
//! the results into one deterministic [`Report`].

pub mod aggregator;
pub mod cancel;
pub mod evaluator;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use semver::{Version, VersionReq};
use tracing::{debug, info, warn};

pub use aggregator::{Aggregator, Diagnostic, DiagnosticKind, Report, ScanStats};
pub use cancel::CancellationToken;
pub use evaluator::{evaluate, FileEvaluation, FileStatus};

use crate::config::ScanConfig;
use crate::error::{EngineError, ParseError, Result};
use crate::ir::{Language, SourceFile, SourceLocation};
use crate::parser::{AdapterRegistry, ParseLimits};
use crate::rules::RuleCatalog;

/// One file handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanInput {
    pub path: PathBuf,
    pub language: Language,
    pub content: Vec<u8>,
}

impl ScanInput {
    pub fn new(path: impl Into<PathBuf>, language: Language, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            language,
            content: content.into(),
        }
    }

    /// Read a file from disk; the language comes from its extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read(path)?;
        let language = path
            .extension()
            .and_then(|e| e.to_str())
            .map(Language::from_extension)
            .unwrap_or(Language::Unknown);
        Ok(Self::new(path, language, content))
    }
}

/// Worker stack reserved per level of syntax tree nesting.
const STACK_BYTES_PER_DEPTH: usize = 4 * 1024;
const MIN_WORKER_STACK_BYTES: usize = 8 * 1024 * 1024;

/// Parses and evaluates source inputs against a rule catalog.
#[derive(Debug)]
pub struct Engine {
    catalog: Arc<RuleCatalog>,
    adapters: AdapterRegistry,
    limits: ParseLimits,
    threads: usize,
    languages: Vec<Language>,
}

impl Engine {
    /// Engine over the built-in catalog and every compiled-in adapter.
    pub fn new(config: &ScanConfig) -> Result<Self> {
        Self::with_parts(config, RuleCatalog::builtin()?, AdapterRegistry::builtin())
    }

    /// Engine over a caller-supplied catalog and adapter registry.
    pub fn with_parts(
        config: &ScanConfig,
        catalog: RuleCatalog,
        adapters: AdapterRegistry,
    ) -> Result<Self> {
        config.validate()?;
        check_catalog_version(&config.catalog_version)?;
        if catalog.is_empty() {
            return Err(EngineError::Catalog("rule catalog is empty".into()));
        }
        for &language in &config.languages {
            if !adapters.supports(language) {
                return Err(EngineError::NoAdapter(language));
            }
        }
        Ok(Self {
            catalog: Arc::new(catalog),
            adapters,
            limits: config.limits(),
            threads: config.threads,
            languages: config.languages.clone(),
        })
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// Scan every input. Per-file and per-rule failures land in the report's
    /// diagnostics; only a missing adapter or a pool failure is an error.
    pub fn scan(&self, inputs: Vec<ScanInput>, cancel: &CancellationToken) -> Result<Report> {
        let inputs: Vec<ScanInput> = inputs
            .into_iter()
            .filter(|input| {
                let wanted = self.languages.is_empty() || self.languages.contains(&input.language);
                if !wanted {
                    debug!(file = %input.path.display(), language = %input.language, "language not selected");
                }
                wanted
            })
            .collect();
        for input in &inputs {
            if !self.adapters.supports(input.language) {
                return Err(EngineError::NoAdapter(input.language));
            }
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("sastline-worker-{i}"))
            .stack_size(worker_stack_size(self.limits.max_depth))
            .build()
            .map_err(|e| EngineError::Internal(format!("failed to build thread pool: {e}")))?;

        let evaluations: Vec<FileEvaluation> =
            pool.install(|| inputs.par_iter().map(|input| self.scan_one(input, cancel)).collect());

        let mut aggregator = Aggregator::new();
        for evaluation in evaluations {
            aggregator.push(evaluation);
        }
        aggregator.set_cancelled(cancel.is_cancelled());
        let report = aggregator.finish();

        info!(
            files = report.stats.files_scanned,
            failed = report.stats.files_failed,
            skipped = report.stats.files_skipped,
            findings = report.stats.findings,
            cancelled = report.cancelled,
            "scan finished"
        );
        Ok(report)
    }

    fn scan_one(&self, input: &ScanInput, cancel: &CancellationToken) -> FileEvaluation {
        if cancel.is_cancelled() {
            return FileEvaluation::skipped(input.path.clone());
        }
        // Checked up front in `scan`.
        let Some(adapter) = self.adapters.get(input.language) else {
            return FileEvaluation::skipped(input.path.clone());
        };

        let parsed = catch_unwind(AssertUnwindSafe(|| adapter.parse(&input.content, &self.limits)))
            .unwrap_or_else(|payload| {
                Err(ParseError::AdapterPanic {
                    message: evaluator::panic_message(payload.as_ref()),
                })
            });
        let outcome = match parsed {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(file = %input.path.display(), language = %input.language, error = %error, "parse failed");
                return FileEvaluation::failed(input.path.clone(), parse_diagnostic(input, &error));
            }
        };
        debug!(
            file = %input.path.display(),
            language = %input.language,
            nodes = outcome.ast.len(),
            recovered = outcome.syntax_errors.len(),
            "parsed"
        );

        let file = SourceFile::new(
            input.path.clone(),
            input.language,
            String::from_utf8_lossy(&input.content).into_owned(),
        );
        let rules = self.catalog.rules_for(input.language);
        evaluate(&file, &outcome, &rules)
    }
}

/// The lowerer recurses once per tree level, up to the depth limit.
fn worker_stack_size(max_depth: usize) -> usize {
    max_depth
        .saturating_mul(STACK_BYTES_PER_DEPTH)
        .max(MIN_WORKER_STACK_BYTES)
}

fn check_catalog_version(requirement: &str) -> Result<()> {
    let req = VersionReq::parse(requirement).map_err(|e| {
        EngineError::Config(format!("invalid catalog_version '{requirement}': {e}"))
    })?;
    let version = Version::parse(RuleCatalog::VERSION)
        .map_err(|e| EngineError::Internal(format!("catalog version: {e}")))?;
    if !req.matches(&version) {
        return Err(EngineError::Catalog(format!(
            "built-in catalog {version} does not satisfy '{requirement}'"
        )));
    }
    Ok(())
}

fn parse_diagnostic(input: &ScanInput, error: &ParseError) -> Diagnostic {
    let location = error.offset().map(|offset| {
        let (line, column) = line_column(&input.content, offset);
        SourceLocation {
            file: input.path.clone(),
            line,
            column,
            end_line: line,
            end_column: column,
        }
    });
    Diagnostic {
        file: input.path.clone(),
        kind: DiagnosticKind::Parse,
        rule_id: None,
        location,
        message: error.to_string(),
    }
}

/// 1-indexed line and byte column of an offset.
fn line_column(content: &[u8], offset: usize) -> (usize, usize) {
    let before = &content[..offset.min(content.len())];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    (line, before.len() - line_start + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(feature = "javascript")]
    use crate::rules::{MatchSite, Rule, RuleContext, RuleMetadata, Severity};

    #[test]
    fn catalog_version_requirements() {
        assert!(check_catalog_version(">=0.1").is_ok());
        assert!(check_catalog_version("*").is_ok());
        assert!(matches!(
            check_catalog_version(">=99.0"),
            Err(EngineError::Catalog(_))
        ));
        assert!(matches!(
            check_catalog_version("not a version"),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn offsets_map_to_lines() {
        assert_eq!(line_column(b"ab\ncd\n", 0), (1, 1));
        assert_eq!(line_column(b"ab\ncd\n", 4), (2, 2));
        assert_eq!(line_column(b"ab", 99), (1, 3));
    }

    #[test]
    fn configured_language_without_adapter_is_fatal() {
        let config = ScanConfig {
            languages: vec![Language::Java],
            ..ScanConfig::default()
        };
        let err = Engine::with_parts(&config, RuleCatalog::builtin().unwrap(), AdapterRegistry::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::NoAdapter(Language::Java)));
    }

    #[test]
    fn depth_limit_above_the_cap_is_rejected() {
        let config = ScanConfig {
            max_ast_depth: 1_000_000,
            ..ScanConfig::default()
        };
        let err = Engine::new(&config).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        assert!(worker_stack_size(crate::config::MAX_AST_DEPTH_LIMIT) >= MIN_WORKER_STACK_BYTES);
    }

    #[test]
    fn empty_catalog_is_fatal() {
        let err = Engine::with_parts(&ScanConfig::default(), RuleCatalog::new(), AdapterRegistry::builtin())
            .unwrap_err();
        assert!(matches!(err, EngineError::Catalog(_)));
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn cancelled_scan_skips_every_file() {
        let engine = Engine::new(&ScanConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let inputs = vec![
            ScanInput::new("a.js", Language::JavaScript, "window.open('https://x.io', '_blank');"),
            ScanInput::new("b.js", Language::JavaScript, "run();"),
        ];
        let report = engine.scan(inputs, &cancel).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.stats.files_skipped, 2);
        assert!(report.findings.is_empty());
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn deepest_allowed_tree_fails_cleanly() {
        let config = ScanConfig {
            max_ast_depth: crate::config::MAX_AST_DEPTH_LIMIT,
            threads: 1,
            ..ScanConfig::default()
        };
        let engine = Engine::new(&config).unwrap();
        let nested = format!("x = {}{};", "[".repeat(20_000), "]".repeat(20_000));
        let inputs = vec![
            ScanInput::new("deep.js", Language::JavaScript, nested),
            ScanInput::new("ok.js", Language::JavaScript, "window.open('https://x.io', '_blank');"),
        ];
        let report = engine.scan(inputs, &CancellationToken::new()).unwrap();
        assert_eq!(report.stats.files_failed, 1);
        assert_eq!(report.stats.files_scanned, 1);
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::Parse);
        assert!(report.diagnostics[0].message.contains("2048"), "{}", report.diagnostics[0].message);
        assert_eq!(report.findings.len(), 1);
    }

    /// Cancels the scan from inside the first file it evaluates.
    #[cfg(feature = "javascript")]
    struct CancelOnFirstFile(CancellationToken);

    #[cfg(feature = "javascript")]
    impl Rule for CancelOnFirstFile {
        fn metadata(&self) -> RuleMetadata {
            RuleMetadata {
                id: "f000.cancel_on_first_file".into(),
                finding: "F000".into(),
                name: "Cancel".into(),
                description: "cancels the running scan".into(),
                default_severity: Severity::Low,
                cwe_id: None,
                languages: vec![Language::JavaScript],
                remediation: None,
            }
        }

        fn check(&self, ctx: &RuleContext<'_>) -> Vec<MatchSite> {
            self.0.cancel();
            ctx.calls()
                .first()
                .map(|call| vec![MatchSite::new(call.span, "evaluated")])
                .unwrap_or_default()
        }
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn cancellation_mid_scan_keeps_finished_files() {
        let cancel = CancellationToken::new();
        let mut catalog = RuleCatalog::new();
        catalog
            .register(Box::new(CancelOnFirstFile(cancel.clone())))
            .unwrap();
        let config = ScanConfig {
            threads: 1,
            ..ScanConfig::default()
        };
        let engine = Engine::with_parts(&config, catalog, AdapterRegistry::builtin()).unwrap();
        let inputs = vec![
            ScanInput::new("a.js", Language::JavaScript, "run();"),
            ScanInput::new("b.js", Language::JavaScript, "run();"),
            ScanInput::new("c.js", Language::JavaScript, "run();"),
        ];
        let report = engine.scan(inputs, &cancel).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.stats.files_scanned, 1);
        assert_eq!(report.stats.files_skipped, 2);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].location.file, PathBuf::from("a.js"));
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn unknown_language_input_is_fatal() {
        let engine = Engine::new(&ScanConfig::default()).unwrap();
        let inputs = vec![ScanInput::new("a.rb", Language::Unknown, "puts 1")];
        let err = engine.scan(inputs, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, EngineError::NoAdapter(Language::Unknown)));
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn parse_errors_point_at_their_offset() {
        let engine = Engine::new(&ScanConfig::default()).unwrap();
        let mut content = b"let a = 1;\nlet b".to_vec();
        content.push(0xff);
        let report = engine
            .scan(
                vec![ScanInput::new("bad.js", Language::JavaScript, content)],
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(report.stats.files_failed, 1);
        let diag = &report.diagnostics[0];
        assert_eq!(diag.kind, DiagnosticKind::Parse);
        let location = diag.location.as_ref().unwrap();
        assert_eq!((location.line, location.column), (2, 6));
    }
}
