use crate::ir::{AstNode, Language, NodeKind};
use crate::rules::builtin::insecure_cipher::java_transformation_weakness;
use crate::rules::{MatchSite, Rule, RuleContext, RuleMetadata, Severity};

/// F052: Insecure key
///
/// Java key material built with inadequate strength:
/// - `new RSAKeyGenParameterSpec(bits, …)` with fewer than 2048 bits
/// - `new ECGenParameterSpec(curve)` naming a curve below 224 bits
/// - `new SecretKeySpec(key, algorithm)` for a broken cipher
///
/// Sizes, curves and algorithms are resolved through constants.
pub struct InsecureKeyRule;

const MIN_RSA_BITS: u64 = 2048;

/// `openssl ecparam -list_curves` entries with fewer than 224 bits.
const WEAK_CURVES: &[&str] = &[
    "secp112r1",
    "secp112r2",
    "secp128r1",
    "secp128r2",
    "secp160k1",
    "secp160r1",
    "secp160r2",
    "secp192k1",
    "prime192v1",
    "prime192v2",
    "prime192v3",
    "sect113r1",
    "sect113r2",
    "sect131r1",
    "sect131r2",
    "sect163k1",
    "sect163r1",
    "sect163r2",
    "sect193r1",
    "sect193r2",
    "c2pnb163v1",
    "c2pnb163v2",
    "c2pnb163v3",
    "c2pnb176v1",
    "c2tnb191v1",
    "c2tnb191v2",
    "c2tnb191v3",
    "c2pnb208w1",
    "wap-wsg-idm-ecid-wtls1",
    "wap-wsg-idm-ecid-wtls3",
    "wap-wsg-idm-ecid-wtls4",
    "wap-wsg-idm-ecid-wtls5",
    "wap-wsg-idm-ecid-wtls6",
    "wap-wsg-idm-ecid-wtls7",
    "wap-wsg-idm-ecid-wtls8",
    "wap-wsg-idm-ecid-wtls9",
    "wap-wsg-idm-ecid-wtls10",
    "wap-wsg-idm-ecid-wtls11",
    "oakley-ec2n-3",
    "oakley-ec2n-4",
    "brainpoolp160r1",
    "brainpoolp160t1",
    "brainpoolp192r1",
    "brainpoolp192t1",
];

impl Rule for InsecureKeyRule {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "f052.insecure_key".into(),
            finding: "F052".into(),
            name: "Insecure key strength".into(),
            description: "Key generated or wrapped with an inadequate size, curve or algorithm"
                .into(),
            default_severity: Severity::High,
            cwe_id: Some("CWE-326".into()),
            languages: vec![Language::Java],
            remediation: Some(
                "Use RSA keys of at least 2048 bits, curves of at least 224 bits \
                 (secp256r1), and AES secret keys."
                    .into(),
            ),
        }
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<MatchSite> {
        ctx.invocations()
            .into_iter()
            .filter(|n| n.kind == NodeKind::New)
            .filter_map(|new| {
                let class = ctx.callee(new)?.rsplit('.').next()?;
                let (message, note) = match class {
                    "RSAKeyGenParameterSpec" => rsa_key_size(ctx, new)?,
                    "ECGenParameterSpec" => weak_curve(ctx, new)?,
                    "SecretKeySpec" => weak_secret_key(ctx, new)?,
                    _ => return None,
                };
                Some(MatchSite::new(new.span, message).with_note(note))
            })
            .collect()
    }
}

fn rsa_key_size<'a>(ctx: &RuleContext<'a>, new: &'a AstNode) -> Option<(String, String)> {
    let size = ctx
        .resolve_value(ctx.positional(new, 0)?)
        .filter(|n| n.kind == NodeKind::NumberLiteral)?;
    let bits = java_integer(ctx.text(size))?;
    (bits < MIN_RSA_BITS).then(|| {
        (
            format!("RSA key of {bits} bits, below {MIN_RSA_BITS}"),
            bits.to_string(),
        )
    })
}

fn weak_curve<'a>(ctx: &RuleContext<'a>, new: &'a AstNode) -> Option<(String, String)> {
    let curve = ctx.resolve_string(ctx.positional(new, 0)?)?;
    WEAK_CURVES
        .contains(&curve.to_ascii_lowercase().as_str())
        .then(|| (format!("elliptic curve {curve} is too small"), curve))
}

fn weak_secret_key<'a>(ctx: &RuleContext<'a>, new: &'a AstNode) -> Option<(String, String)> {
    let algorithm = ctx.resolve_string(*new.args().last()?)?;
    let reason = java_transformation_weakness(&algorithm)?;
    Some((format!("SecretKeySpec for {algorithm}: {reason}"), algorithm))
}

/// Decimal Java integer literal, with `_` separators and an `L` suffix.
fn java_integer(text: &str) -> Option<u64> {
    let digits: String = text
        .trim()
        .trim_end_matches(['l', 'L'])
        .chars()
        .filter(|c| *c != '_')
        .collect();
    digits.parse().ok()
}
