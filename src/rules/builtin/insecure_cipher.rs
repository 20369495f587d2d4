use crate::ir::{AstNode, Language};
use crate::rules::{MatchSite, Rule, RuleContext, RuleMetadata, Severity, ECMASCRIPT};

/// F052: Insecure cipher mode
///
/// Flags block ciphers configured with a mode outside the allow-list, and
/// broken algorithm families, across:
/// - node `crypto.createCipheriv` / `createDecipheriv` / `createCipher`
/// - `crypto-js` `CryptoJS.<Cipher>.encrypt(data, key, { mode })`
/// - PyCryptodome `AES.new(key, AES.MODE_ECB)`, `DES.new`, `ARC4.new`
/// - Java `Cipher.getInstance("ALG/MODE/PAD")`, `KeyGenerator.getInstance`,
///   `SSLContext.getInstance`
///
/// Algorithm strings and modes are resolved through intermediate variables.
/// Anything that does not resolve is left alone.
pub struct InsecureCipherRule;

/// Modes that leak plaintext structure or lack integrity.
const UNSAFE_MODES: &[&str] = &["ecb", "cfb", "ofb"];

/// Accepted modes, for reference in messages.
const SAFE_MODES: &[&str] = &["ctr", "gcm", "cbc", "ccm", "ocb"];

/// OpenSSL algorithm families broken regardless of mode.
const WEAK_NODE_FAMILIES: &[&str] = &["des", "des-ede", "des-ede3", "rc2", "rc4", "bf", "blowfish"];

const NODE_FACTORIES: &[&str] = &[
    "createCipheriv",
    "createDecipheriv",
    "createCipher",
    "createDecipher",
];

const WEAK_CRYPTO_JS: &[&str] = &["DES", "TripleDES", "RC4", "RC4Drop"];

const WEAK_PYCRYPTO: &[&str] = &["DES", "DES3", "ARC2", "ARC4", "Blowfish"];

const WEAK_JAVA_ALGORITHMS: &[&str] = &[
    "des",
    "desede",
    "tripledes",
    "rc2",
    "rc4",
    "arcfour",
    "blowfish",
];

/// Pinned versions only; bare `TLS` and `DTLS` are flagged.
const SAFE_TLS_PROTOCOLS: &[&str] = &["tlsv1.2", "tlsv1.3", "dtlsv1.2", "dtlsv1.3"];

impl Rule for InsecureCipherRule {
    fn metadata(&self) -> RuleMetadata {
        let mut languages = ECMASCRIPT.to_vec();
        languages.extend([Language::Python, Language::Java]);
        RuleMetadata {
            id: "f052.insecure_cipher_mode".into(),
            finding: "F052".into(),
            name: "Insecure encryption algorithm".into(),
            description: "Block cipher configured with an unsafe mode (ECB, CFB, OFB) or a \
                          broken algorithm (DES, 3DES, RC2, RC4, Blowfish)"
                .into(),
            default_severity: Severity::High,
            cwe_id: Some("CWE-327".into()),
            languages,
            remediation: Some(format!(
                "Use AES in an authenticated or standard mode ({}).",
                SAFE_MODES.join(", ").to_uppercase()
            )),
        }
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<MatchSite> {
        let mut sites = Vec::new();
        for call in ctx.calls() {
            let weakness = match ctx.language() {
                Language::Python => pycrypto(ctx, call),
                Language::Java => java(ctx, call),
                _ => node_crypto(ctx, call).or_else(|| crypto_js(ctx, call)),
            };
            if let Some((message, note)) = weakness {
                sites.push(MatchSite::new(call.span, message).with_note(note));
            }
        }
        sites
    }
}

type Weakness = (String, String);

fn node_crypto<'a>(ctx: &RuleContext<'a>, call: &'a AstNode) -> Option<Weakness> {
    let method = ctx.method(call)?;
    if !NODE_FACTORIES.contains(&method) || ctx.module_of(call)? != "crypto" {
        return None;
    }
    let algorithm = ctx.resolve_string(ctx.positional(call, 0)?)?;
    let reason = node_cipher_weakness(&algorithm)?;
    Some((format!("{method} uses {algorithm}: {reason}"), algorithm))
}

/// Why an OpenSSL cipher name is unsafe, if it is.
pub(crate) fn node_cipher_weakness(algorithm: &str) -> Option<String> {
    let algorithm = algorithm.to_ascii_lowercase();
    let weak_family = WEAK_NODE_FAMILIES
        .iter()
        .any(|f| algorithm == *f || algorithm.starts_with(&format!("{f}-")));
    if weak_family {
        return Some("broken algorithm family".into());
    }
    let mode = algorithm.rsplit('-').next()?;
    UNSAFE_MODES
        .iter()
        .find(|m| mode.starts_with(**m))
        .map(|m| format!("{} mode", m.to_uppercase()))
}

fn crypto_js<'a>(ctx: &RuleContext<'a>, call: &'a AstNode) -> Option<Weakness> {
    let method = ctx.method(call)?;
    if method != "encrypt" && method != "decrypt" {
        return None;
    }
    let module = ctx.module_of(call)?;
    if !module.starts_with("crypto-js") && module != "CryptoJS" {
        return None;
    }
    let callee = ctx.callee(call)?;
    let cipher = callee.rsplit('.').nth(1)?;
    if WEAK_CRYPTO_JS.contains(&cipher) {
        return Some((
            format!("{callee} uses broken cipher {cipher}"),
            cipher.to_string(),
        ));
    }
    let options = ctx.positional(call, 2)?;
    let mode = ctx.object_property(options, "mode")?;
    let mode = ctx.resolve_value(mode)?.dotted_path()?;
    let name = mode.rsplit('.').next()?.to_ascii_lowercase();
    UNSAFE_MODES.contains(&name.as_str()).then(|| {
        (
            format!("{callee} configured with {} mode", name.to_uppercase()),
            mode.clone(),
        )
    })
}

fn pycrypto<'a>(ctx: &RuleContext<'a>, call: &'a AstNode) -> Option<Weakness> {
    if ctx.method(call)? != "new" {
        return None;
    }
    let callee = ctx.callee(call)?;
    let cipher = callee.rsplit('.').nth(1)?;
    let module = ctx.module_of(call)?;
    let from_library =
        module.starts_with("Crypto") || module.starts_with("Cryptodome") || module == cipher;
    if !from_library {
        return None;
    }
    if WEAK_PYCRYPTO.contains(&cipher) {
        return Some((
            format!("{callee} uses broken cipher {cipher}"),
            cipher.to_string(),
        ));
    }
    let mode = ctx
        .keyword(call, "mode")
        .or_else(|| ctx.positional(call, 1))?;
    let mode = ctx.resolve_value(mode)?.dotted_path()?;
    let name = mode.rsplit('.').next()?;
    let unsafe_mode = UNSAFE_MODES
        .iter()
        .find(|m| name.eq_ignore_ascii_case(&format!("mode_{m}")))?;
    Some((
        format!("{callee} configured with {} mode", unsafe_mode.to_uppercase()),
        mode.clone(),
    ))
}

fn java<'a>(ctx: &RuleContext<'a>, call: &'a AstNode) -> Option<Weakness> {
    if ctx.method(call)? != "getInstance" {
        return None;
    }
    let callee = ctx.callee(call)?;
    let class = callee.rsplit('.').nth(1)?;
    let argument = ctx.resolve_string(ctx.positional(call, 0)?)?;
    let reason = match class {
        "Cipher" => java_transformation_weakness(&argument)?,
        "KeyGenerator" => {
            let algorithm = argument.to_ascii_lowercase();
            WEAK_JAVA_ALGORITHMS
                .contains(&algorithm.as_str())
                .then(|| "broken algorithm".to_string())?
        }
        "SSLContext" => {
            let protocol = argument.to_ascii_lowercase();
            (!SAFE_TLS_PROTOCOLS.contains(&protocol.as_str()))
                .then(|| "insecure protocol version".to_string())?
        }
        _ => return None,
    };
    Some((format!("{class}.getInstance(\"{argument}\"): {reason}"), argument))
}

/// Why a JCA transformation string is unsafe, if it is.
pub(crate) fn java_transformation_weakness(transformation: &str) -> Option<String> {
    let lowered = transformation.to_ascii_lowercase();
    let mut parts = lowered.splitn(3, '/');
    let algorithm = parts.next().unwrap_or("");
    let mode = parts.next().unwrap_or("");
    let padding = parts.next().unwrap_or("");

    if WEAK_JAVA_ALGORITHMS.contains(&algorithm) {
        return Some("broken algorithm".into());
    }
    if algorithm == "rsa" && !padding.contains("oaep") {
        return Some("RSA without OAEP padding".into());
    }
    UNSAFE_MODES
        .iter()
        .find(|m| mode.starts_with(**m))
        .map(|m| format!("{} mode", m.to_uppercase()))
}
