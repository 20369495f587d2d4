//! sastline: static application security testing for JavaScript, TypeScript,
//! Python and Java.
//!
//! Sources are parsed with tree-sitter, lowered into one unified AST with a
//! def-use symbol table, and checked against a catalog of vulnerability
//! rules. Reports render to console, JSON or SARIF 2.1.0.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use sastline::{scan_path, ScanOptions};
//!
//! let options = ScanOptions::default();
//! let report = scan_path(Path::new("./my-service"), &options).unwrap();
//! println!("Pass: {}, Findings: {}", report.verdict.pass, report.findings.len());
//! ```

pub mod config;
pub mod discover;
pub mod engine;
pub mod error;
pub mod ir;
pub mod output;
pub mod parser;
pub mod rules;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use config::{Config, CONFIG_FILE_NAME};
use engine::{CancellationToken, Diagnostic, Engine, Report, ScanInput, ScanStats};
use error::Result;
use output::OutputFormat;
use rules::policy::{Policy, PolicyVerdict};
use rules::{Finding, Severity};

/// Options for a scan invocation.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Path to config file (defaults to `.sastline.toml` in the scan root).
    pub config_path: Option<PathBuf>,
    /// Output format.
    pub format: OutputFormat,
    /// CLI override for fail_on threshold.
    pub fail_on_override: Option<Severity>,
    /// CLI override for the worker thread count.
    pub threads_override: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            format: OutputFormat::Console,
            fail_on_override: None,
            threads_override: None,
        }
    }
}

/// Complete scan report: the engine's report with the policy applied.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub target_name: String,
    /// Findings left after ignore rules and severity overrides.
    pub findings: Vec<Finding>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: ScanStats,
    pub cancelled: bool,
    pub verdict: PolicyVerdict,
}

impl ScanReport {
    pub fn new(target_name: impl Into<String>, report: Report, policy: &Policy) -> Self {
        let verdict = policy.evaluate(&report.findings);
        Self {
            target_name: target_name.into(),
            findings: policy.apply(&report.findings),
            diagnostics: report.diagnostics,
            stats: report.stats,
            cancelled: report.cancelled,
            verdict,
        }
    }
}

/// Discover, parse and evaluate everything under `path`, then apply policy.
pub fn scan_path(path: &Path, options: &ScanOptions) -> Result<ScanReport> {
    let config_path = options
        .config_path
        .clone()
        .unwrap_or_else(|| config_dir(path).join(CONFIG_FILE_NAME));
    let mut config = Config::load(&config_path)?;
    if let Some(fail_on) = options.fail_on_override {
        config.policy.fail_on = fail_on;
    }
    if let Some(threads) = options.threads_override {
        config.scan.threads = threads;
    }

    let files = discover::discover(path, &config.scan)?;
    debug!(root = %path.display(), files = files.len(), "discovered sources");

    let mut inputs = Vec::with_capacity(files.len());
    for file in files {
        match std::fs::read(&file.path) {
            Ok(content) => inputs.push(ScanInput::new(file.path, file.language, content)),
            Err(e) => warn!(file = %file.path.display(), error = %e, "unreadable, skipping"),
        }
    }

    let target_name = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    scan_sources(target_name, inputs, &config, &CancellationToken::new())
}

/// Scan in-memory inputs under `config`, then apply its policy.
pub fn scan_sources(
    target_name: impl Into<String>,
    inputs: Vec<ScanInput>,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<ScanReport> {
    let engine = Engine::new(&config.scan)?;
    let report = engine.scan(inputs, cancel)?;
    Ok(ScanReport::new(target_name, report, &config.policy))
}

/// Render a scan report in the specified format.
pub fn render_report(report: &ScanReport, format: OutputFormat) -> Result<String> {
    output::render(report, format)
}

fn config_dir(path: &Path) -> &Path {
    if path.is_file() {
        path.parent().unwrap_or(path)
    } else {
        path
    }
}
