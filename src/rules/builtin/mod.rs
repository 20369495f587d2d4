mod hardcoded_salt;
mod hardcoded_secret;
mod header_injection;
mod insecure_cipher;
mod insecure_hash;
mod insecure_key;
mod insecure_password_encoder;
mod jwt_decode;
mod jwt_signing;
mod log_injection;
mod tabnabbing;

use super::Rule;

/// Returns every built-in rule, in catalog order.
pub fn all_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(hardcoded_secret::HardcodedSecretRule),
        Box::new(insecure_cipher::InsecureCipherRule),
        Box::new(insecure_hash::InsecureHashRule),
        Box::new(insecure_key::InsecureKeyRule),
        Box::new(insecure_password_encoder::InsecurePasswordEncoderRule),
        Box::new(log_injection::LogInjectionRule),
        Box::new(header_injection::HeaderInjectionRule),
        Box::new(tabnabbing::TabnabbingRule),
        Box::new(jwt_signing::JwtInsecureSigningRule),
        Box::new(jwt_decode::JwtDecodeWithoutVerifyRule),
        Box::new(hardcoded_salt::HardcodedSaltRule),
    ]
}
