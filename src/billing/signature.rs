// src/billing/signature.rs

//! The two signing schemes the payment gateway expects.
//!
//! Both are plain SHA-256 over a concatenation ending in a shared secret, not
//! HMAC. They must stay byte-for-byte as they are to keep talking to the
//! gateway.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Prefix of every Pro checkout reference.
pub const PRO_REFERENCE_PREFIX: &str = "PRO";

/// `hex(SHA256(body || secret))`, the checksum sent with webhook events.
pub fn event_checksum(body: &[u8], secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares the provided checksum with the expected one as exact strings.
/// An unset secret never verifies.
pub fn verify_event_checksum(body: &[u8], secret: &str, provided: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let expected = event_checksum(body, secret);
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// `hex(SHA256(reference || amount_in_cents || currency || secret))`, the
/// integrity signature the checkout widget sends to the gateway.
pub fn integrity_signature(
    reference: &str,
    amount_in_cents: i64,
    currency: &str,
    secret: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(reference.as_bytes());
    hasher.update(amount_in_cents.to_string().as_bytes());
    hasher.update(currency.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// `PRO-<userId>-<unix millis>`.
pub fn pro_reference(user_id: i64, at: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}",
        PRO_REFERENCE_PREFIX,
        user_id,
        at.timestamp_millis()
    )
}

/// Second dash-separated field of a reference, if it is a user id.
pub fn user_id_from_reference(reference: &str) -> Option<i64> {
    reference.split('-').nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA256_ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn checksum_is_sha256_of_body_then_secret() {
        assert_eq!(event_checksum(b"ab", "c"), SHA256_ABC);
    }

    #[test]
    fn verify_accepts_exact_match_only() {
        let body = br#"{"data":{}}"#;
        let good = event_checksum(body, "s3cret");
        assert!(verify_event_checksum(body, "s3cret", &good));
        assert!(!verify_event_checksum(body, "s3cret", &good.to_uppercase()));
        assert!(!verify_event_checksum(body, "other", &good));
        assert!(!verify_event_checksum(b"tampered", "s3cret", &good));
        assert!(!verify_event_checksum(body, "s3cret", ""));
    }

    #[test]
    fn empty_secret_never_verifies() {
        let sum = event_checksum(b"x", "");
        assert!(!verify_event_checksum(b"x", "", &sum));
    }

    #[test]
    fn integrity_signature_concatenates_fields() {
        let sig = integrity_signature("PRO-1-2", 2_000_000, "COP", "integ");
        assert_eq!(sig, event_checksum(b"PRO-1-22000000COP", "integ"));
        assert_ne!(sig, integrity_signature("PRO-1-2", 2_000_001, "COP", "integ"));
    }

    #[test]
    fn reference_round_trip() {
        let at = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_123).unwrap();
        let reference = pro_reference(42, at);
        assert_eq!(reference, "PRO-42-1700000000123");
        assert_eq!(user_id_from_reference(&reference), Some(42));
    }

    #[test]
    fn malformed_references_resolve_to_nobody() {
        assert_eq!(user_id_from_reference("PRO"), None);
        assert_eq!(user_id_from_reference("PRO-abc-1"), None);
        assert_eq!(user_id_from_reference(""), None);
        // only the second field matters
        assert_eq!(user_id_from_reference("X-7"), Some(7));
    }
}
