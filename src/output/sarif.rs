use std::collections::BTreeMap;
use std::path::Path;

use crate::engine::{Diagnostic, DiagnosticKind};
use crate::error::Result;
use crate::rules::{Finding, Severity};
use crate::ScanReport;

use serde_json::{json, Value};

/// Key under `partialFingerprints` carrying [`Finding::fingerprint`].
const FINGERPRINT_KEY: &str = "sastline/v1";

/// Render a report as SARIF 2.1.0.
///
/// Produces a self-contained SARIF log compatible with GitHub Code Scanning
/// and other SARIF consumers. Diagnostics become tool execution
/// notifications.
pub fn render(report: &ScanReport) -> Result<String> {
    let findings = &report.findings;

    // First finding per rule id, in id order.
    let mut by_rule: BTreeMap<&str, &Finding> = BTreeMap::new();
    for finding in findings {
        by_rule.entry(finding.rule_id.as_str()).or_insert(finding);
    }
    let rule_index: BTreeMap<&str, usize> = by_rule
        .keys()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect();

    let rules: Vec<Value> = by_rule
        .values()
        .map(|finding| {
            let mut rule = json!({
                "id": finding.rule_id,
                "name": finding.rule_name,
                "shortDescription": { "text": finding.title() },
                "defaultConfiguration": {
                    "level": severity_to_sarif_level(finding.severity),
                },
            });
            if let Some(remediation) = &finding.remediation {
                rule["help"] = json!({ "text": remediation });
            }
            let mut tags = vec![finding.finding.clone()];
            tags.extend(finding.cwe_id.clone());
            rule["properties"] = json!({ "tags": tags });
            rule
        })
        .collect();

    let results: Vec<Value> = findings
        .iter()
        .map(|f| {
            let loc = &f.location;
            let mut region = json!({
                "startLine": loc.line,
                "startColumn": loc.column,
                "endLine": loc.end_line,
                "endColumn": loc.end_column,
            });
            if let Some(snippet) = &f.snippet {
                region["snippet"] = json!({ "text": snippet });
            }
            let mut result = json!({
                "ruleId": f.rule_id,
                "ruleIndex": rule_index.get(f.rule_id.as_str()),
                "level": severity_to_sarif_level(f.severity),
                "message": { "text": f.message },
                "locations": [{
                    "physicalLocation": {
                        "artifactLocation": { "uri": uri(&loc.file) },
                        "region": region,
                    },
                }],
                "partialFingerprints": { FINGERPRINT_KEY: f.fingerprint },
            });
            if let Some(note) = &f.note {
                result["properties"] = json!({ "note": note });
            }
            if let Some(remediation) = &f.remediation {
                result["fixes"] = json!([{
                    "description": { "text": remediation },
                }]);
            }
            result
        })
        .collect();

    let notifications: Vec<Value> = report.diagnostics.iter().map(notification).collect();

    let sarif = json!({
        "$schema": "https://docs.oasis-open.org/sarif/sarif/v2.1.0/errata01/os/schemas/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "sastline",
                    "version": env!("CARGO_PKG_VERSION"),
                    "semanticVersion": env!("CARGO_PKG_VERSION"),
                    "rules": rules,
                },
            },
            "invocations": [{
                "executionSuccessful": !report.cancelled,
                "toolExecutionNotifications": notifications,
            }],
            "results": results,
            "automationDetails": {
                "id": format!("sastline/{}", report.target_name),
            },
        }],
    });

    let output = serde_json::to_string_pretty(&sarif)?;
    Ok(output)
}

fn notification(diag: &Diagnostic) -> Value {
    let level = match diag.kind {
        DiagnosticKind::Parse | DiagnosticKind::Rule => "error",
        DiagnosticKind::SyntaxRecovered => "warning",
    };
    let mut physical = json!({
        "artifactLocation": { "uri": uri(&diag.file) },
    });
    if let Some(loc) = &diag.location {
        physical["region"] = json!({
            "startLine": loc.line,
            "startColumn": loc.column,
        });
    }
    let mut value = json!({
        "level": level,
        "message": { "text": diag.message },
        "descriptor": { "id": diag.kind.to_string() },
        "locations": [{ "physicalLocation": physical }],
    });
    if let Some(rule_id) = &diag.rule_id {
        value["associatedRule"] = json!({ "id": rule_id });
    }
    value
}

/// Forward-slash URI for a report path.
fn uri(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn severity_to_sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low | Severity::Info => "note",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::testing;

    fn sarif(findings: Vec<Finding>) -> Value {
        let report = testing::report(findings);
        serde_json::from_str(&render(&report).unwrap()).unwrap()
    }

    #[test]
    fn results_carry_full_regions_and_fingerprints() {
        let finding = testing::finding("f097.window_open_tabnabbing", Severity::Low, 3);
        let fingerprint = finding.fingerprint.clone();
        let log = sarif(vec![finding]);
        let result = &log["runs"][0]["results"][0];
        let region = &result["locations"][0]["physicalLocation"]["region"];
        assert_eq!(region["startLine"], 3);
        assert_eq!(region["endLine"], 3);
        assert_eq!(region["startColumn"], 5);
        assert_eq!(region["endColumn"], 30);
        assert_eq!(result["partialFingerprints"][FINGERPRINT_KEY], fingerprint.as_str());
        assert_eq!(result["level"], "note");
        assert_eq!(result["ruleIndex"], 0);
    }

    #[test]
    fn rules_are_unique_and_sorted() {
        let log = sarif(vec![
            testing::finding("f097.window_open_tabnabbing", Severity::Low, 3),
            testing::finding("f009.hardcoded_secret", Severity::High, 1),
            testing::finding("f097.window_open_tabnabbing", Severity::Low, 9),
        ]);
        let rules = log["runs"][0]["tool"]["driver"]["rules"].as_array().unwrap();
        let ids: Vec<&str> = rules.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["f009.hardcoded_secret", "f097.window_open_tabnabbing"]);
        assert_eq!(log["runs"][0]["results"][0]["ruleIndex"], 1);
        assert_eq!(log["runs"][0]["results"][1]["ruleIndex"], 0);
    }

    #[test]
    fn diagnostics_become_notifications() {
        let log = sarif(Vec::new());
        let invocation = &log["runs"][0]["invocations"][0];
        assert_eq!(invocation["executionSuccessful"], true);
        let note = &invocation["toolExecutionNotifications"][0];
        assert_eq!(note["level"], "error");
        assert_eq!(note["descriptor"]["id"], "parse");
        assert_eq!(
            note["locations"][0]["physicalLocation"]["artifactLocation"]["uri"],
            "src/broken.py"
        );
    }
}
