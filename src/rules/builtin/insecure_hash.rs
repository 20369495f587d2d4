use crate::ir::{AstNode, Language};
use crate::rules::{MatchSite, Rule, RuleContext, RuleMetadata, Severity, ECMASCRIPT};

/// F052: Insecure hash
///
/// Flags message digests with practical collision attacks:
/// - node `crypto.createHash('md5' | 'sha1' | 'md4' | 'ripemd160')`
/// - Python `hashlib.md5()`, `hashlib.sha1()`, `hashlib.new('md5')`
/// - Java `MessageDigest.getInstance`, commons-codec `DigestUtils`, Guava
///   `Hashing`
pub struct InsecureHashRule;

const WEAK_DIGESTS: &[&str] = &["md2", "md4", "md5", "sha1", "sha-1", "ripemd160"];

const WEAK_DIGEST_UTILS: &[&str] = &[
    "getMd2Digest",
    "getMd5Digest",
    "getShaDigest",
    "getSha1Digest",
    "md2",
    "md2Hex",
    "md5",
    "md5Hex",
    "sha",
    "shaHex",
    "sha1",
    "sha1Hex",
];

const WEAK_GUAVA_HASHING: &[&str] = &[
    "adler32",
    "crc32",
    "crc32c",
    "goodFastHash",
    "hmacMd5",
    "hmacSha1",
    "md5",
    "sha1",
];

impl Rule for InsecureHashRule {
    fn metadata(&self) -> RuleMetadata {
        let mut languages = ECMASCRIPT.to_vec();
        languages.extend([Language::Python, Language::Java]);
        RuleMetadata {
            id: "f052.insecure_hash".into(),
            finding: "F052".into(),
            name: "Insecure hash algorithm".into(),
            description: "Digest algorithm with known collision attacks (MD5, SHA-1, MD4)".into(),
            default_severity: Severity::Medium,
            cwe_id: Some("CWE-328".into()),
            languages,
            remediation: Some("Use SHA-256 or stronger (SHA-384, SHA-512, SHA-3).".into()),
        }
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<MatchSite> {
        ctx.calls()
            .into_iter()
            .filter_map(|call| {
                let digest = match ctx.language() {
                    Language::Python => hashlib(ctx, call),
                    Language::Java => java(ctx, call),
                    _ => node_crypto(ctx, call),
                }?;
                Some(
                    MatchSite::new(call.span, format!("Weak hash algorithm {digest}"))
                        .with_note(digest),
                )
            })
            .collect()
    }
}

fn is_weak(name: &str) -> bool {
    WEAK_DIGESTS.contains(&name.to_ascii_lowercase().as_str())
}

fn node_crypto<'a>(ctx: &RuleContext<'a>, call: &'a AstNode) -> Option<String> {
    if ctx.method(call)? != "createHash" || ctx.module_of(call)? != "crypto" {
        return None;
    }
    let algorithm = ctx.resolve_string(ctx.positional(call, 0)?)?;
    is_weak(&algorithm).then_some(algorithm)
}

fn hashlib<'a>(ctx: &RuleContext<'a>, call: &'a AstNode) -> Option<String> {
    if ctx.module_of(call)? != "hashlib" {
        return None;
    }
    let method = ctx.method(call)?;
    if method == "new" {
        let name = ctx
            .keyword(call, "name")
            .or_else(|| ctx.positional(call, 0))?;
        let algorithm = ctx.resolve_string(name)?;
        return is_weak(&algorithm).then_some(algorithm);
    }
    is_weak(method).then(|| method.to_string())
}

fn java<'a>(ctx: &RuleContext<'a>, call: &'a AstNode) -> Option<String> {
    let method = ctx.method(call)?;
    let callee = ctx.callee(call)?;
    let class = callee.rsplit('.').nth(1)?;
    match class {
        "MessageDigest" if method == "getInstance" => {
            let algorithm = ctx.resolve_string(ctx.positional(call, 0)?)?;
            is_weak(&algorithm).then_some(algorithm)
        }
        "DigestUtils" if WEAK_DIGEST_UTILS.contains(&method) => Some(callee.to_string()),
        "Hashing" if WEAK_GUAVA_HASHING.contains(&method) => Some(callee.to_string()),
        _ => None,
    }
}
