// Unit tests for one-time codes

use super::*;
use pretty_assertions::assert_eq;

// base32 of the RFC 6238 SHA-1 test key "12345678901234567890"
const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

#[test]
fn test_rfc6238_vectors() {
    assert_eq!(TotpGenerator::code_at(RFC_SECRET, 59).unwrap(), "287082");
    assert_eq!(TotpGenerator::code_at(RFC_SECRET, 1111111109).unwrap(), "081804");
}

#[test]
fn test_secret_is_normalized() {
    let spaced = "gezd gnbv gy3t qojq gezd gnbv gy3t qojq";
    assert_eq!(TotpGenerator::code_at(spaced, 59).unwrap(), "287082");
}

#[test]
fn test_step_secret_wins_over_configured() {
    let generator = TotpGenerator::new(Some("not base32 !!".to_string()));
    let code = generator
        .code_for(&format!("Enter the TOTP code using secret key {}", RFC_SECRET))
        .unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
}

#[test]
fn test_configured_secret_used_when_step_has_none() {
    let generator = TotpGenerator::new(Some(RFC_SECRET.to_string()));
    assert_eq!(generator.code_for("Enter the 2FA code").unwrap().len(), 6);
}

#[test]
fn test_missing_secret_is_an_error() {
    let generator = TotpGenerator::new(Some("  ".to_string()));
    assert!(generator.code_for("Enter the 2FA code").is_err());
}
