use crate::ir::{Language, NodeKind};
use crate::rules::{MatchSite, Rule, RuleContext, RuleMetadata, Severity};

/// F052: Insecure password encoder
///
/// Spring Security encoders that store passwords with a fast digest, no
/// hashing at all, or deprecated parameters. Matched on `new` expressions,
/// by simple or fully qualified class name.
pub struct InsecurePasswordEncoderRule;

const SPRING_SECURITY: &str = "org.springframework.security";

/// Class paths relative to [`SPRING_SECURITY`].
const WEAK_ENCODERS: &[&str] = &[
    "authentication.encoding.ShaPasswordEncoder",
    "authentication.encoding.Md5PasswordEncoder",
    "crypto.password.LdapShaPasswordEncoder",
    "crypto.password.Md4PasswordEncoder",
    "crypto.password.MessageDigestPasswordEncoder",
    "crypto.password.NoOpPasswordEncoder",
    "crypto.password.StandardPasswordEncoder",
    "crypto.scrypt.SCryptPasswordEncoder",
];

impl Rule for InsecurePasswordEncoderRule {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "f052.insecure_password_encoder".into(),
            finding: "F052".into(),
            name: "Insecure password encoder".into(),
            description: "Passwords stored with a deprecated or non-hashing Spring encoder".into(),
            default_severity: Severity::High,
            cwe_id: Some("CWE-916".into()),
            languages: vec![Language::Java],
            remediation: Some("Use BCryptPasswordEncoder or Argon2PasswordEncoder.".into()),
        }
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Vec<MatchSite> {
        ctx.invocations()
            .into_iter()
            .filter(|n| n.kind == NodeKind::New)
            .filter_map(|new| {
                let class = ctx.callee(new)?;
                let encoder = weak_encoder(class)?;
                Some(
                    MatchSite::new(new.span, format!("{encoder} does not hash passwords safely"))
                        .with_note(encoder),
                )
            })
            .collect()
    }
}

/// Simple name of a weak encoder, given the class as written.
fn weak_encoder(class: &str) -> Option<&'static str> {
    WEAK_ENCODERS.iter().copied().find_map(|path| {
        let simple = path.rsplit('.').next()?;
        let qualified = class.strip_prefix(SPRING_SECURITY).and_then(|c| c.strip_prefix('.'));
        (class == simple || qualified == Some(path)).then_some(simple)
    })
}
