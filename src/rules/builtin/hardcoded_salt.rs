use once_cell::sync::Lazy;
use regex::Regex;

use crate::ir::{AstNode, Language, NodeKind, Role};
use crate::rules::{MatchSite, Rule, RuleContext, RuleMetadata, Severity, ECMASCRIPT};

/// F338: Hardcoded salt
///
/// Flags salts taken from string literals:
/// - declarations and assignments to salt-named variables
/// - the salt argument of `crypto.pbkdf2[Sync]`, `crypto.scrypt[Sync]`
/// - a string salt passed to `bcrypt.hash[Sync]`
/// - the salt of `hashlib.pbkdf2_hmac` and any Python `salt=` keyword
///
/// Randomness sources (`crypto.randomBytes`, `os.urandom`) never resolve to
/// a literal and are not flagged.
pub struct HardcodedSaltRule;

static SALT_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)salt").unwrap());

/// Salt-adjacent names holding sizes or counts rather than the salt.
static SALT_PARAMETER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(rounds?|len(gth)?|size|bytes|bits)$").unwrap());

const NODE_KDFS: &[&str] = &["pbkdf2", "pbkdf2Sync", "scrypt", "scryptSync"];
const BCRYPT_HASHES: &[&str] = &["hash", "hashSync"];
const BCRYPT_MODULES: &[&str] = &["bcrypt", "bcryptjs"];

impl Rule for HardcodedSaltRule {
    fn metadata(&self) -> RuleMetadata {
        let mut languages = ECMASCRIPT.to_vec();
        languages.push(Language::Python);
        RuleMetadata {
            id: "f338.hardcoded_salt".into(),
            finding: "F338".into(),
            name: "Hardcoded salt".into(),
            description: "Salt is a constant instead of coming from a randomness source".into(),
            default_severity: Severity::Medium,
            cwe_id: Some("CWE-760".into()),
            languages,
            remediation: Some(
                "Generate a fresh salt per secret (crypto.randomBytes(16), os.urandom(16), \
                 bcrypt.genSalt) and store it beside the hash."
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
                    node.child(Role::Left).and_then(|l| l.attr("property").or_else(|| l.name())),
                    node.child(Role::Right),
                ),
                _ => continue,
            };
            let (Some(name), Some(value)) = (name, value) else {
                continue;
            };
            if !is_salt_name(name) {
                continue;
            }
            if let Some(salt) = literal_salt(ctx, value) {
                sites.push(
                    MatchSite::new(node.span, format!("Salt '{name}' is a hardcoded literal"))
                        .with_note(salt),
                );
            }
        }

        for call in ctx.calls() {
            let Some(argument) = salt_argument(ctx, call) else {
                continue;
            };
            // Salt-named variables are reported where they are assigned.
            if argument.name().is_some_and(is_salt_name) {
                continue;
            }
            if let Some(salt) = ctx.resolve_string(argument).filter(|s| !s.is_empty()) {
                let callee = ctx.callee(call).unwrap_or("call");
                sites.push(
                    MatchSite::new(call.span, format!("{callee} is given a hardcoded salt"))
                        .with_note(salt),
                );
            }
        }

        sites
    }
}

fn is_salt_name(name: &str) -> bool {
    SALT_NAME.is_match(name) && !SALT_PARAMETER.is_match(name)
}

/// Constant salt written in place: a literal, or an encoding call on one.
fn literal_salt<'a>(ctx: &RuleContext<'a>, value: &'a AstNode) -> Option<String> {
    if matches!(value.kind, NodeKind::Identifier | NodeKind::Member) {
        return None;
    }
    ctx.resolve_string(value).filter(|s| !s.is_empty())
}

fn salt_argument<'a>(ctx: &RuleContext<'a>, call: &'a AstNode) -> Option<&'a AstNode> {
    let method = ctx.method(call)?;
    if ctx.language() == Language::Python {
        if let Some(salt) = ctx.keyword(call, "salt") {
            return Some(salt);
        }
        return (method == "pbkdf2_hmac" && ctx.module_of(call)? == "hashlib")
            .then(|| ctx.positional(call, 2))
            .flatten();
    }
    let module = ctx.module_of(call)?;
    let kdf = NODE_KDFS.contains(&method) && module == "crypto";
    let bcrypt = BCRYPT_HASHES.contains(&method) && BCRYPT_MODULES.contains(&module.as_str());
    if kdf || bcrypt {
        ctx.positional(call, 1)
    } else {
        None
    }
}
