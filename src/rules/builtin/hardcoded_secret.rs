use once_cell::sync::Lazy;
use regex::Regex;

use crate::ir::{AstNode, Language, NodeKind, Role};
use crate::rules::builtin::jwt_signing::jwt_module;
use crate::rules::{MatchSite, Rule, RuleContext, RuleMetadata, Severity, ECMASCRIPT};

/// F009: Hardcoded secret
///
/// Flags JWT signing and verification keys that resolve to a string literal,
/// and secret-named variables initialized with a non-empty literal.
pub struct HardcodedSecretRule;

static SECRET_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(secret|password|passwd|api_?key|private_?key|access_?token)").unwrap()
});

/// Names that mention a secret without holding one.
static SECRET_METADATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(len(gth)?|min|max|field|label|hint|regex|pattern|placeholder|prompt|message|url|path|file|name|env|header)$")
        .unwrap()
});

impl Rule for HardcodedSecretRule {
    fn metadata(&self) -> RuleMetadata {
        let mut languages = ECMASCRIPT.to_vec();
        languages.extend([Language::Python, Language::Java]);
        RuleMetadata {
            id: "f009.hardcoded_secret".into(),
            finding: "F009".into(),
            name: "Hardcoded secret".into(),
            description: "Credential or signing key embedded in source code".into(),
            default_severity: Severity::High,
            cwe_id: Some("CWE-798".into()),
            languages,
            remediation: Some(
                "Load secrets from the environment or a secret manager and rotate the exposed \
                 value."
                    .into(),
            ),
        }
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<MatchSite> {
        let mut sites = Vec::new();

        for node in ctx.ast.walk() {
            let (name, value) = match node.kind {
                NodeKind::VariableDeclarator => (node.name(), node.child(Role::Value)),
                NodeKind::Assignment if node.attr("operator") == Some("=") => (
                    node.child(Role::Left)
                        .and_then(|l| l.attr("property").or_else(|| l.name())),
                    node.child(Role::Right),
                ),
                _ => continue,
            };
            let (Some(name), Some(value)) = (name, value) else {
                continue;
            };
            if !is_secret_name(name) || matches!(value.kind, NodeKind::Identifier | NodeKind::Member) {
                continue;
            }
            if ctx.resolve_string(value).is_some_and(|s| !s.is_empty()) {
                sites.push(
                    MatchSite::new(node.span, format!("'{name}' is assigned a hardcoded secret"))
                        .with_note(name),
                );
            }
        }

        for call in ctx.calls() {
            let Some(key) = jwt_key_argument(ctx, call) else {
                continue;
            };
            // Secret-named variables are reported where they are assigned.
            if key.name().is_some_and(is_secret_name) {
                continue;
            }
            if ctx.resolve_string(key).is_some_and(|s| !s.is_empty()) {
                let callee = ctx.callee(call).unwrap_or("jwt");
                sites.push(
                    MatchSite::new(call.span, format!("{callee} uses a hardcoded key"))
                        .with_note(ctx.text(key).to_string()),
                );
            }
        }

        sites
    }
}

fn is_secret_name(name: &str) -> bool {
    SECRET_NAME.is_match(name) && !SECRET_METADATA.is_match(name)
}

fn jwt_key_argument<'a>(ctx: &RuleContext<'a>, call: &'a AstNode) -> Option<&'a AstNode> {
    jwt_module(ctx, call)?;
    let method = ctx.method(call)?;
    match ctx.language() {
        Language::Python if method == "encode" || method == "decode" => ctx
            .keyword(call, "key")
            .or_else(|| ctx.positional(call, 1)),
        Language::Python | Language::Java => None,
        _ if method == "sign" || method == "verify" => ctx.positional(call, 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_names() {
        assert!(is_secret_name("JWT_SECRET"));
        assert!(is_secret_name("apiKey"));
        assert!(is_secret_name("db_password"));
        assert!(!is_secret_name("PASSWORD_MIN_LENGTH"));
        assert!(!is_secret_name("passwordField"));
        assert!(!is_secret_name("username"));
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn literal_keys_and_secret_variables() {
        use crate::rules::testing::lines;
        let src = r#"const jwt = require('jsonwebtoken');
const JWT_SECRET = 'hunter2';
const fromEnv = process.env.JWT_SECRET;
const signingKey = 'k' + 'ey';
jwt.sign(payload, JWT_SECRET);
jwt.sign(payload, signingKey);
jwt.verify(token, fromEnv);
jwt.verify(token, 'inline');
const password = '';
"#;
        assert_eq!(lines(&HardcodedSecretRule, Language::JavaScript, src), vec![2, 6, 8]);
    }

    #[cfg(feature = "python")]
    #[test]
    fn python_settings_and_pyjwt() {
        use crate::rules::testing::lines;
        let src = r#"import jwt, os
SECRET_KEY = "django-insecure-abc"
API_KEY = os.environ["API_KEY"]
token = jwt.encode(payload, "s3cr3t", algorithm="HS256")
claims = jwt.decode(token, key=os.environ["K"], algorithms=["HS256"])
"#;
        assert_eq!(lines(&HardcodedSecretRule, Language::Python, src), vec![2, 4]);
    }

    #[cfg(feature = "java")]
    #[test]
    fn java_fields() {
        use crate::rules::testing::lines;
        let src = r#"class Conf {
    private static final String DB_PASSWORD = "p4ss";
    private String apiKey = System.getenv("API_KEY");
}
"#;
        assert_eq!(lines(&HardcodedSecretRule, Language::Java, src), vec![2]);
    }
}
