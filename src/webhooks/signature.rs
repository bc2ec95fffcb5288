//! Webhook signature verification using HMAC-SHA256.
//!
//! The issue tracker signs each delivery with HMAC-SHA256 over the raw request
//! body using a shared secret, and sends the digest as lowercase hex. Some
//! senders prefix the digest with `sha256=`; both forms are accepted.
//!
//! Verification must run on the bytes received over the wire. Parsing and
//! re-serializing the JSON first can change the bytes and silently break the
//! comparison.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 digest in bytes.
pub const SIGNATURE_LEN: usize = 32;

/// Parses a signature header value into raw digest bytes.
///
/// Returns `None` for malformed values (bad hex, wrong length, unknown
/// algorithm prefix). Never panics.
///
/// # Examples
///
/// ```
/// use autopilot::webhooks::parse_signature_header;
///
/// let hex = "ab".repeat(32);
/// assert!(parse_signature_header(&hex).is_some());
/// assert!(parse_signature_header(&format!("sha256={hex}")).is_some());
///
/// // Wrong length
/// assert!(parse_signature_header("abcd1234").is_none());
///
/// // Wrong algorithm
/// assert!(parse_signature_header(&format!("sha1={hex}")).is_none());
///
/// // Bad hex
/// assert!(parse_signature_header(&"zz".repeat(32)).is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let header = header.trim();
    let hex_sig = header.strip_prefix("sha256=").unwrap_or(header);

    let bytes = hex::decode(hex_sig).ok()?;
    (bytes.len() == SIGNATURE_LEN).then_some(bytes)
}

/// Computes the HMAC-SHA256 signature of a payload using the given secret.
///
/// Senders use this to sign; tests use it to build valid deliveries.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a signature the way the tracker sends it: bare lowercase hex.
pub fn format_signature_header(signature: &[u8]) -> String {
    hex::encode(signature)
}

/// Verifies a webhook signature against the payload and secret.
///
/// Returns `false` when the header is absent, malformed, or does not match.
/// The comparison is constant-time.
///
/// # Examples
///
/// ```
/// use autopilot::webhooks::{compute_signature, format_signature_header, verify_signature};
///
/// let payload = b"{\"action\":\"create\"}";
/// let secret = b"my-secret-key";
/// let header = format_signature_header(&compute_signature(payload, secret));
///
/// assert!(verify_signature(payload, Some(&header), secret));
/// assert!(!verify_signature(payload, Some(&header), b"wrong-secret"));
/// assert!(!verify_signature(payload, None, secret));
/// ```
pub fn verify_signature(payload: &[u8], signature_header: Option<&str>, secret: &[u8]) -> bool {
    let Some(expected_signature) = signature_header.and_then(parse_signature_header) else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);

    // Constant-time comparison via the HMAC library
    mac.verify_slice(&expected_signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn header_for(payload: &[u8], secret: &[u8]) -> String {
        format_signature_header(&compute_signature(payload, secret))
    }

    // ========================================================================
    // Header parsing
    // ========================================================================

    #[test]
    fn parse_accepts_bare_and_prefixed_hex() {
        let hex_sig = "a".repeat(64);
        assert_eq!(parse_signature_header(&hex_sig).map(|s| s.len()), Some(32));
        assert_eq!(
            parse_signature_header(&format!("sha256={hex_sig}")).map(|s| s.len()),
            Some(32)
        );
    }

    #[test]
    fn parse_accepts_uppercase_hex() {
        let result = parse_signature_header(&"AB".repeat(32));
        assert_eq!(result, Some(vec![0xab; 32]));
    }

    #[test]
    fn parse_rejects_malformed_values() {
        assert_eq!(parse_signature_header(""), None);
        assert_eq!(parse_signature_header("sha256="), None);
        assert_eq!(parse_signature_header("abc"), None);
        assert_eq!(parse_signature_header(&"a".repeat(62)), None);
        assert_eq!(parse_signature_header(&"a".repeat(66)), None);
        assert_eq!(parse_signature_header(&format!("sha1={}", "a".repeat(64))), None);
        assert_eq!(parse_signature_header(&"g".repeat(64)), None);
    }

    // ========================================================================
    // Verification
    // ========================================================================

    #[test]
    fn verify_known_payload() {
        let payload = br#"{"action":"create","type":"Issue"}"#;
        let secret = b"lin_wh_test";
        let header = header_for(payload, secret);

        assert!(verify_signature(payload, Some(&header), secret));
        assert!(verify_signature(
            payload,
            Some(&format!("sha256={header}")),
            secret
        ));
    }

    #[test]
    fn verify_wrong_secret_fails() {
        let payload = b"test payload";
        let header = header_for(payload, b"correct-secret");

        assert!(verify_signature(payload, Some(&header), b"correct-secret"));
        assert!(!verify_signature(payload, Some(&header), b"wrong-secret"));
    }

    #[test]
    fn verify_modified_payload_fails() {
        let secret = b"secret";
        let header = header_for(b"original payload", secret);

        assert!(!verify_signature(b"modified payload", Some(&header), secret));
    }

    #[test]
    fn verify_missing_header_fails() {
        assert!(!verify_signature(b"test", None, b"secret"));
    }

    #[test]
    fn verify_malformed_header_returns_false() {
        let payload = b"test";
        let secret = b"secret";

        assert!(!verify_signature(payload, Some(""), secret));
        assert!(!verify_signature(payload, Some("sha256="), secret));
        assert!(!verify_signature(payload, Some("sha256=invalid"), secret));
        assert!(!verify_signature(payload, Some("not-a-header"), secret));
    }

    #[test]
    fn verify_empty_and_binary_payloads() {
        let secret = b"secret";
        for payload in [&b""[..], &[0x00, 0x01, 0xff, 0xfe, 0x00, 0x7f][..]] {
            let header = header_for(payload, secret);
            assert!(verify_signature(payload, Some(&header), secret));
        }
    }

    #[test]
    fn signature_is_32_bytes() {
        assert_eq!(compute_signature(b"any", b"key").len(), SIGNATURE_LEN);
    }

    #[test]
    fn compute_signature_accepts_any_key_length() {
        let payload = b"{\"action\":\"create\"}";
        for secret in [Vec::new(), vec![0x5a; 200]] {
            let sig = compute_signature(payload, &secret);
            assert_eq!(sig.len(), SIGNATURE_LEN);
            assert!(verify_signature(
                payload,
                Some(&format_signature_header(&sig)),
                &secret
            ));
        }
    }

    // ========================================================================
    // Property-based tests
    // ========================================================================

    proptest! {
        /// Signing then verifying with the same secret always succeeds.
        #[test]
        fn prop_sign_verify(payload: Vec<u8>, secret: Vec<u8>) {
            let header = header_for(&payload, &secret);
            prop_assert!(verify_signature(&payload, Some(&header), &secret));
        }

        /// Flipping any single bit of the body breaks verification.
        #[test]
        fn prop_single_bit_flip_fails(
            payload in prop::collection::vec(any::<u8>(), 1..512),
            index: prop::sample::Index,
            bit in 0u8..8,
            secret in prop::collection::vec(any::<u8>(), 1..64),
        ) {
            let header = header_for(&payload, &secret);
            let mut tampered = payload.clone();
            let i = index.index(tampered.len());
            tampered[i] ^= 1 << bit;
            prop_assert!(!verify_signature(&tampered, Some(&header), &secret));
        }

        /// Appending a byte breaks verification.
        #[test]
        fn prop_extended_payload_fails(payload: Vec<u8>, extra: u8, secret: Vec<u8>) {
            let header = header_for(&payload, &secret);
            let mut extended = payload.clone();
            extended.push(extra);
            prop_assert!(!verify_signature(&extended, Some(&header), &secret));
        }

        /// Arbitrary header strings never cause a panic.
        #[test]
        fn prop_arbitrary_header_no_panic(header: String, payload: Vec<u8>, secret: Vec<u8>) {
            let _ = parse_signature_header(&header);
            let _ = verify_signature(&payload, Some(&header), &secret);
        }
    }
}
