use crate::engine::DiagnosticKind;
use crate::rules::{Finding, Severity};
use crate::ScanReport;

/// Render a report as console output, grouped by severity then file path.
pub fn render(report: &ScanReport) -> String {
    let mut output = String::new();

    if report.findings.is_empty() {
        output.push_str("\n  No security findings detected.\n\n");
    } else {
        // Critical first; the aggregator's file/line order is kept within a severity.
        let mut sorted: Vec<&Finding> = report.findings.iter().collect();
        sorted.sort_by(|a, b| b.severity.cmp(&a.severity));

        output.push_str(&format!(
            "\n  {} finding(s) detected:\n\n",
            report.findings.len()
        ));

        for finding in &sorted {
            let severity_tag = match finding.severity {
                Severity::Critical => "[CRITICAL]",
                Severity::High => "[HIGH]    ",
                Severity::Medium => "[MEDIUM]  ",
                Severity::Low => "[LOW]     ",
                Severity::Info => "[INFO]    ",
            };
            let loc = &finding.location;

            output.push_str(&format!(
                "  {} {} {}\n",
                severity_tag,
                finding.title(),
                finding.message
            ));
            output.push_str(&format!(
                "           at {}:{}:{}\n",
                loc.file.display(),
                loc.line,
                loc.column
            ));
            if let Some(snippet) = &finding.snippet {
                output.push_str(&format!("           | {}\n", snippet));
            }
            if let Some(remediation) = &finding.remediation {
                output.push_str(&format!("           fix: {}\n", remediation));
            }
            output.push('\n');
        }
    }

    if !report.diagnostics.is_empty() {
        output.push_str(&format!(
            "  {} diagnostic(s):\n",
            report.diagnostics.len()
        ));
        for diag in &report.diagnostics {
            let position = diag
                .location
                .as_ref()
                .map(|l| format!("{}:{}:{}", l.file.display(), l.line, l.column))
                .unwrap_or_else(|| diag.file.display().to_string());
            let rule = match (&diag.kind, &diag.rule_id) {
                (DiagnosticKind::Rule, Some(id)) => format!(" [{}]", id),
                _ => String::new(),
            };
            output.push_str(&format!(
                "    {}{} {}: {}\n",
                diag.kind, rule, position, diag.message
            ));
        }
        output.push('\n');
    }

    let stats = &report.stats;
    output.push_str(&format!(
        "  Scanned {} file(s), {} failed, {} skipped{}\n",
        stats.files_scanned,
        stats.files_failed,
        stats.files_skipped,
        if report.cancelled { " (cancelled)" } else { "" },
    ));

    // Verdict
    let verdict = &report.verdict;
    let status = if verdict.pass { "PASS" } else { "FAIL" };
    output.push_str(&format!(
        "  Result: {} (threshold: {}, highest: {})\n\n",
        status,
        verdict.fail_threshold,
        verdict
            .highest_severity
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".into()),
    ));

    output
}
