use crate::ir::{AstNode, Language};
use crate::rules::{MatchSite, Rule, RuleContext, RuleMetadata, Severity, ECMASCRIPT};

/// F309: Insecure JWT signing
///
/// Flags `jwt.sign(payload, key, { algorithm })` (jsonwebtoken) and
/// `jwt.encode(payload, key, algorithm=…)` (PyJWT) whose algorithm is
/// `none`. The options object may be built earlier in scope, including
/// `opts.algorithm = …` assignments. When no algorithm is given the library
/// default applies.
pub struct JwtInsecureSigningRule;

const INSECURE_ALGORITHMS: &[&str] = &["none"];

/// Algorithm each library signs with when none is passed.
const LIBRARY_DEFAULTS: &[(&str, &str)] = &[("jsonwebtoken", "HS256"), ("jwt", "HS256")];

impl Rule for JwtInsecureSigningRule {
    fn metadata(&self) -> RuleMetadata {
        let mut languages = ECMASCRIPT.to_vec();
        languages.push(Language::Python);
        RuleMetadata {
            id: "f309.jwt_insecure_signing".into(),
            finding: "F309".into(),
            name: "Insecure JWT signing".into(),
            description: "JSON Web Token signed with the 'none' algorithm can be forged by anyone"
                .into(),
            default_severity: Severity::High,
            cwe_id: Some("CWE-347".into()),
            languages,
            remediation: Some(
                "Sign tokens with HS256 or an asymmetric algorithm such as RS256 or ES256.".into(),
            ),
        }
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<MatchSite> {
        ctx.calls()
            .into_iter()
            .filter_map(|call| {
                let algorithm = signing_algorithm(ctx, call)?;
                ctx.in_safe_list(&algorithm, INSECURE_ALGORITHMS).then(|| {
                    MatchSite::new(
                        call.span,
                        format!("JWT signed with insecure algorithm '{algorithm}'"),
                    )
                    .with_note(algorithm)
                })
            })
            .collect()
    }
}

/// Algorithm a signing call uses, falling back to the library default.
/// `None` when the call is not a JWT signing call or the algorithm is not a
/// constant.
fn signing_algorithm<'a>(ctx: &RuleContext<'a>, call: &'a AstNode) -> Option<String> {
    let module = jwt_module(ctx, call)?;
    let option = match ctx.language() {
        Language::Python => {
            if ctx.method(call)? != "encode" {
                return None;
            }
            ctx.keyword(call, "algorithm")
                .or_else(|| ctx.positional(call, 2))
        }
        _ => {
            if ctx.method(call)? != "sign" {
                return None;
            }
            match ctx.positional(call, 2) {
                Some(options) => {
                    let value = ctx.object_property(options, "algorithm");
                    if value.is_none() && !ctx.is_known_object(options) {
                        // Options come from somewhere we cannot see.
                        return None;
                    }
                    value
                }
                None => None,
            }
        }
    };
    match option {
        Some(value) => ctx.resolve_string(value),
        None => LIBRARY_DEFAULTS
            .iter()
            .find(|(library, _)| *library == module)
            .map(|(_, algorithm)| algorithm.to_string()),
    }
}

/// JWT library a call is made on, if any.
pub(crate) fn jwt_module<'a>(ctx: &RuleContext<'a>, call: &'a AstNode) -> Option<String> {
    let module = ctx.module_of(call)?;
    match module.as_str() {
        "jsonwebtoken" | "jwt" => Some(module),
        _ => None,
    }
}
