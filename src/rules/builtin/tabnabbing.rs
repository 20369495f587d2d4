use url::Url;

use crate::ir::AstNode;
use crate::rules::{MatchSite, Rule, RuleContext, RuleMetadata, Severity, ECMASCRIPT};

/// F097: Reverse tabnabbing
///
/// Flags `window.open(url, "_blank"[, features])` where `url` resolves to an
/// external http(s) address and `features` is absent or lacks `noopener` or
/// `noreferrer`. A url, target or features argument that does not resolve to
/// a constant is never flagged.
pub struct TabnabbingRule;

const REQUIRED_FEATURES: &[&str] = &["noopener", "noreferrer"];

impl Rule for TabnabbingRule {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "f097.window_open_tabnabbing".into(),
            finding: "F097".into(),
            name: "Reverse tabnabbing".into(),
            description: "window.open to an external site in a new tab without noopener and \
                          noreferrer lets the opened page redirect the opener"
                .into(),
            default_severity: Severity::Low,
            cwe_id: Some("CWE-1022".into()),
            languages: ECMASCRIPT.to_vec(),
            remediation: Some(
                "Pass \"noopener,noreferrer\" as the third argument to window.open.".into(),
            ),
        }
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<MatchSite> {
        ctx.calls()
            .into_iter()
            .filter(|call| ctx.callee(call) == Some("window.open"))
            .filter_map(|call| self.check_call(ctx, call))
            .collect()
    }
}

impl TabnabbingRule {
    fn check_call<'a>(&self, ctx: &RuleContext<'a>, call: &'a AstNode) -> Option<MatchSite> {
        let url = ctx.resolve_string(ctx.positional(call, 0)?)?;
        if !is_external(&url) {
            return None;
        }
        let target = ctx.resolve_string(ctx.positional(call, 1)?)?;
        if !target.eq_ignore_ascii_case("_blank") {
            return None;
        }
        let missing = match ctx.positional(call, 2) {
            None => REQUIRED_FEATURES.to_vec(),
            Some(features) => missing_features(&ctx.resolve_string(features)?),
        };
        if missing.is_empty() {
            return None;
        }
        Some(
            MatchSite::new(
                call.span,
                format!(
                    "window.open to {url} in a new tab without {}",
                    missing.join(" or ")
                ),
            )
            .with_note(url),
        )
    }
}

/// Absolute http(s) URL with a host, or a protocol-relative `//host/…`.
pub(crate) fn is_external(raw: &str) -> bool {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("//") {
        return !rest.is_empty() && !rest.starts_with('/');
    }
    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Required window features absent from a features string.
fn missing_features(features: &str) -> Vec<&'static str> {
    let present: Vec<String> = features
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .filter_map(|token| {
            let (name, value) = match token.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (token, None),
            };
            let enabled = value.map_or(true, |v| !matches!(v.trim(), "no" | "0" | "false"));
            enabled.then(|| name.trim().to_ascii_lowercase())
        })
        .collect();
    REQUIRED_FEATURES
        .iter()
        .copied()
        .filter(|f| !present.iter().any(|p| p == f))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_urls() {
        assert!(is_external("https://evil.example"));
        assert!(is_external("http://example.com/path?q=1"));
        assert!(is_external("//cdn.example.com/x"));
        assert!(!is_external("/relative/path"));
        assert!(!is_external("mailto:a@example.com"));
        assert!(!is_external("javascript:void(0)"));
        assert!(!is_external("page.html"));
    }

    #[test]
    fn feature_parsing() {
        assert!(missing_features("noopener,noreferrer").is_empty());
        assert!(missing_features("width=200, noopener, noreferrer").is_empty());
        assert_eq!(missing_features("noopener"), vec!["noreferrer"]);
        assert_eq!(missing_features("noopener=no,noreferrer"), vec!["noopener"]);
        assert_eq!(missing_features(""), vec!["noopener", "noreferrer"]);
    }

    #[cfg(feature = "javascript")]
    mod js {
        use super::super::*;
        use crate::ir::Language;
        use crate::rules::testing::{lines, run};

        #[test]
        fn flags_new_tab_without_features() {
            let src = "const url = 'https://example.com';\nwindow.open(url, '_blank');\n";
            let sites = run(&TabnabbingRule, Language::JavaScript, src);
            assert_eq!(sites.len(), 1);
            assert_eq!(sites[0].span.start_line, 2);
            assert_eq!(sites[0].note.as_deref(), Some("https://example.com"));
        }

        #[test]
        fn protected_or_unresolvable_calls_pass() {
            let src = r#"const url = 'https://example.com';
window.open(url, '_blank', 'noopener,noreferrer');
window.open('/local', '_blank');
window.open(url, '_self');
window.open(url, '_blank', 'noopener');
function go(link) { window.open(link, '_blank'); }
function go2(feat) { window.open(url, '_blank', feat); }
"#;
            assert_eq!(lines(&TabnabbingRule, Language::JavaScript, src), vec![5]);
        }
    }
}
