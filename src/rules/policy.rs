use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{Finding, Severity};

/// Policy verdict: the final pass/fail decision after applying the ignore
/// list and severity overrides to raw findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub pass: bool,
    pub total_findings: usize,
    pub effective_findings: usize,
    pub highest_severity: Option<Severity>,
    pub fail_threshold: Severity,
}

/// `[policy]` table of `.sastline.toml`.
///
/// Rule selectors match either a full rule id (`f052.insecure_hash`) or a
/// finding code (`F052`), case-insensitively. A rule id wins over its code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Minimum severity to fail the scan.
    #[serde(default = "default_fail_on")]
    pub fail_on: Severity,
    /// Rule ids or finding codes to ignore entirely.
    #[serde(default)]
    pub ignore_rules: BTreeSet<String>,
    /// Per-rule (or per-code) severity overrides.
    #[serde(default)]
    pub overrides: BTreeMap<String, Severity>,
}

fn default_fail_on() -> Severity {
    Severity::High
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            fail_on: default_fail_on(),
            ignore_rules: BTreeSet::new(),
            overrides: BTreeMap::new(),
        }
    }
}

impl Policy {
    fn is_ignored(&self, finding: &Finding) -> bool {
        self.ignore_rules.iter().any(|sel| {
            sel.eq_ignore_ascii_case(&finding.rule_id) || sel.eq_ignore_ascii_case(&finding.finding)
        })
    }

    fn severity_for(&self, finding: &Finding) -> Severity {
        let lookup = |key: &str| {
            self.overrides
                .iter()
                .find(|(sel, _)| sel.eq_ignore_ascii_case(key))
                .map(|(_, sev)| *sev)
        };
        lookup(&finding.rule_id)
            .or_else(|| lookup(&finding.finding))
            .unwrap_or(finding.severity)
    }

    /// Evaluate findings against this policy and produce a verdict.
    pub fn evaluate(&self, findings: &[Finding]) -> PolicyVerdict {
        let effective: Vec<Severity> = findings
            .iter()
            .filter(|f| !self.is_ignored(f))
            .map(|f| self.severity_for(f))
            .collect();

        let highest = effective.iter().copied().max();
        let failed = effective.iter().any(|&sev| sev >= self.fail_on);

        PolicyVerdict {
            pass: !failed,
            total_findings: findings.len(),
            effective_findings: effective.len(),
            highest_severity: highest,
            fail_threshold: self.fail_on,
        }
    }

    /// Filter findings: remove ignored rules, apply overrides. Order is kept.
    pub fn apply(&self, findings: &[Finding]) -> Vec<Finding> {
        findings
            .iter()
            .filter(|f| !self.is_ignored(f))
            .map(|f| {
                let mut f = f.clone();
                f.severity = self.severity_for(&f);
                f
            })
            .collect()
    }
}
