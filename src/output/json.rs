use crate::engine::{Diagnostic, ScanStats};
use crate::error::Result;
use crate::rules::policy::PolicyVerdict;
use crate::rules::Finding;
use crate::ScanReport;

use serde::Serialize;

#[derive(Serialize)]
struct JsonReport<'a> {
    target: &'a str,
    findings: &'a [Finding],
    diagnostics: &'a [Diagnostic],
    stats: &'a ScanStats,
    cancelled: bool,
    verdict: &'a PolicyVerdict,
}

/// Render a report as JSON.
pub fn render(report: &ScanReport) -> Result<String> {
    let json = JsonReport {
        target: &report.target_name,
        findings: &report.findings,
        diagnostics: &report.diagnostics,
        stats: &report.stats,
        cancelled: report.cancelled,
        verdict: &report.verdict,
    };
    Ok(serde_json::to_string_pretty(&json)?)
}
