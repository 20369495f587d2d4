use crate::ir::{AstNode, Language, NodeKind, Role};
use crate::rules::builtin::jwt_signing::jwt_module;
use crate::rules::{MatchSite, Rule, RuleContext, RuleMetadata, Severity, ECMASCRIPT};

/// F309: JWT decoded without verification
///
/// JavaScript: `jwt.decode(token, …)` (or a bare `decode` with no binding in
/// the file) with no `verify(token, key, …)` on the same token and key
/// earlier in the same function body. `decode` never checks the signature in
/// jsonwebtoken.
///
/// Python: PyJWT verifies by default, so `jwt.decode` is flagged only with
/// `verify=False` or `options={"verify_signature": False}`.
pub struct JwtDecodeWithoutVerifyRule;

impl Rule for JwtDecodeWithoutVerifyRule {
    fn metadata(&self) -> RuleMetadata {
        let mut languages = ECMASCRIPT.to_vec();
        languages.push(Language::Python);
        RuleMetadata {
            id: "f309.jwt_decode_without_verify".into(),
            finding: "F309".into(),
            name: "JWT decoded without verification".into(),
            description: "Token claims are read without checking the signature".into(),
            default_severity: Severity::Medium,
            cwe_id: Some("CWE-347".into()),
            languages,
            remediation: Some(
                "Verify the token (jwt.verify / jwt.decode with verification enabled) before \
                 trusting its claims."
                    .into(),
            ),
        }
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<MatchSite> {
        ctx.calls()
            .into_iter()
            .filter(|call| ctx.method(call) == Some("decode"))
            .filter_map(|call| {
                let unverified = match ctx.language() {
                    Language::Python => python_verification_disabled(ctx, call),
                    _ => ecmascript_unverified(ctx, call),
                };
                unverified.then(|| {
                    let token = ctx.positional(call, 0).map(|t| ctx.text(t).to_string());
                    let site = MatchSite::new(call.span, "JWT decoded without verifying its signature");
                    match token {
                        Some(token) => site.with_note(token),
                        None => site,
                    }
                })
            })
            .collect()
    }
}

fn ecmascript_unverified<'a>(ctx: &RuleContext<'a>, call: &'a AstNode) -> bool {
    if jwt_module(ctx, call).is_none() && !unbound_bare_decode(ctx, call) {
        return false;
    }
    let Some(token) = ctx.positional(call, 0) else {
        return false;
    };
    let token = ctx.text(token).trim();
    let key = ctx.positional(call, 1).map(|k| ctx.text(k).trim());
    !ctx.preceding_calls(call).into_iter().any(|prior| {
        ctx.method(prior) == Some("verify")
            && ctx
                .positional(prior, 0)
                .is_some_and(|t| ctx.text(t).trim() == token)
            && key.map_or(true, |key| {
                ctx.positional(prior, 1)
                    .is_some_and(|k| ctx.text(k).trim() == key)
            })
    })
}

/// A bare `decode(...)` whose name is bound nowhere in the file. Any
/// binding (import, `require`, local function, parameter) must instead
/// resolve to a JWT library.
fn unbound_bare_decode<'a>(ctx: &RuleContext<'a>, call: &'a AstNode) -> bool {
    call.child(Role::Callee)
        .filter(|c| c.kind == NodeKind::Identifier && c.name() == Some("decode"))
        .is_some_and(|c| ctx.binding_of(c).is_none())
}

fn python_verification_disabled<'a>(ctx: &RuleContext<'a>, call: &'a AstNode) -> bool {
    if jwt_module(ctx, call).is_none() {
        return false;
    }
    if ctx.keyword(call, "verify").is_some_and(|v| is_false(ctx, v)) {
        return true;
    }
    ctx.keyword(call, "options")
        .and_then(|o| ctx.resolve_object(o))
        .and_then(|o| ctx.literal_property(o, "verify_signature"))
        .is_some_and(|v| is_false(ctx, v))
}

fn is_false<'a>(ctx: &RuleContext<'a>, node: &'a AstNode) -> bool {
    ctx.resolve_value(node).is_some_and(|v| {
        v.kind == NodeKind::BooleanLiteral && v.attr("value").is_some_and(|b| b.eq_ignore_ascii_case("false"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "javascript")]
    #[test]
    fn decode_without_prior_verify() {
        use crate::rules::testing::{lines, run};
        let src = r#"function read(token, key, algos) {
    return decode(token, key, algos);
}
"#;
        let sites = run(&JwtDecodeWithoutVerifyRule, Language::JavaScript, src);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].note.as_deref(), Some("token"));

        let src = r#"function read(token, key, algos, config) {
    verify(token, key, config);
    return decode(token, key, algos);
}
"#;
        assert!(lines(&JwtDecodeWithoutVerifyRule, Language::JavaScript, src).is_empty());
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn verify_must_cover_the_same_token_in_the_same_function() {
        use crate::rules::testing::lines;
        let src = r#"const jwt = require('jsonwebtoken');
jwt.verify(outer, key);
function a(token, other) {
    jwt.verify(other, key);
    return jwt.decode(token);
}
function b(token) {
    jwt.verify(token, key);
    return jwt.decode(token);
}
function c(token) {
    const claims = jwt.decode(token);
    jwt.verify(token, key);
    return claims;
}
function decode(x) { return x; }
decode(outer);
Buffer.decode(raw);
"#;
        assert_eq!(lines(&JwtDecodeWithoutVerifyRule, Language::JavaScript, src), vec![5, 12]);
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn bare_decode_bound_to_another_module_is_ignored() {
        use crate::rules::testing::lines;
        let src = r#"const { decode } = require('he');
function render(html) {
    return decode(html);
}
"#;
        assert!(lines(&JwtDecodeWithoutVerifyRule, Language::JavaScript, src).is_empty());

        let src = r#"import { decode } from 'entities';
export const text = (html) => decode(html);
"#;
        assert!(lines(&JwtDecodeWithoutVerifyRule, Language::JavaScript, src).is_empty());

        let src = r#"const { decode } = require('jsonwebtoken');
function read(token) {
    return decode(token);
}
"#;
        assert_eq!(lines(&JwtDecodeWithoutVerifyRule, Language::JavaScript, src), vec![3]);
    }

    #[cfg(feature = "javascript")]
    #[test]
    fn verify_with_another_key_does_not_cover_decode() {
        use crate::rules::testing::lines;
        let src = r#"function read(token, key, otherKey, algos, cfg) {
    verify(token, otherKey, cfg);
    return decode(token, key, algos);
}
"#;
        assert_eq!(lines(&JwtDecodeWithoutVerifyRule, Language::JavaScript, src), vec![3]);

        let src = r#"function read(token, key, algos, cfg) {
    verify(token, key, cfg);
    return decode(token, key, algos);
}
"#;
        assert!(lines(&JwtDecodeWithoutVerifyRule, Language::JavaScript, src).is_empty());
    }

    #[cfg(feature = "python")]
    #[test]
    fn pyjwt_only_when_verification_disabled() {
        use crate::rules::testing::lines;
        let src = r#"import jwt
OPTS = {"verify_signature": False}
a = jwt.decode(token, key, algorithms=["HS256"])
b = jwt.decode(token, verify=False)
c = jwt.decode(token, options={"verify_signature": False})
d = jwt.decode(token, key, options=OPTS)
e = jwt.decode(token, key, options={"verify_signature": True})
"#;
        assert_eq!(
            lines(&JwtDecodeWithoutVerifyRule, Language::Python, src),
            vec![4, 5, 6]
        );
    }
}
