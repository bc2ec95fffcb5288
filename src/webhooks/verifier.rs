//! The verification gate in front of the task queue.
//!
//! Every inbound delivery passes three checks, strictly in this order:
//!
//! 1. **Signature**: HMAC-SHA256 over the raw body matches the claimed digest.
//! 2. **Timestamp**: the claimed send time is within the tolerance window of
//!    now, in either direction.
//! 3. **Replay**: the signature has not already been accepted.
//!
//! The first failure short-circuits. Timestamp and replay data are never
//! consulted for a request whose signature has not been proven, and the
//! replay cache is only written for requests that passed the first two
//! checks.
//!
//! All checks return plain values. A failed check is an expected outcome,
//! not an error.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use super::replay::ReplayCache;
use super::signature::verify_signature;

/// Default freshness window for claimed timestamps.
pub const DEFAULT_TIMESTAMP_TOLERANCE: TimeDelta = TimeDelta::seconds(300);

/// Result of running a delivery through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    BadSignature,
    StaleTimestamp,
    Replayed,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// Short machine-readable reason, used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::BadSignature => "bad_signature",
            Verdict::StaleTimestamp => "stale_timestamp",
            Verdict::Replayed => "replayed",
        }
    }
}

/// Signature, freshness and replay checks for one shared secret.
#[derive(Debug)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
    tolerance: TimeDelta,
    replay: ReplayCache,
}

impl WebhookVerifier {
    /// Creates a verifier with the default tolerance window.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self::with_tolerance(secret, DEFAULT_TIMESTAMP_TOLERANCE)
    }

    /// Creates a verifier accepting timestamps within `tolerance` of now.
    ///
    /// Accepted signatures are remembered for twice the window. A timestamp
    /// dated up to `tolerance` ahead stays fresh until `tolerance` after that,
    /// so a shorter memory would let a future-dated delivery through twice.
    pub fn with_tolerance(secret: impl Into<Vec<u8>>, tolerance: TimeDelta) -> Self {
        WebhookVerifier {
            secret: secret.into(),
            tolerance,
            replay: ReplayCache::new(tolerance * 2),
        }
    }

    pub fn tolerance(&self) -> TimeDelta {
        self.tolerance
    }

    /// Checks the claimed signature against the raw body.
    pub fn verify_signature(&self, raw_body: &[u8], signature: Option<&str>) -> bool {
        verify_signature(raw_body, signature, &self.secret)
    }

    /// Checks a claimed send time, in milliseconds since the Unix epoch.
    pub fn check_timestamp(&self, claimed_millis: Option<i64>) -> bool {
        self.check_timestamp_at(claimed_millis, Utc::now())
    }

    /// Like [`check_timestamp`](Self::check_timestamp), at an explicit time.
    pub fn check_timestamp_at(&self, claimed_millis: Option<i64>, now: DateTime<Utc>) -> bool {
        let Some(claimed) = claimed_millis.and_then(DateTime::from_timestamp_millis) else {
            return false;
        };
        (now - claimed).abs() <= self.tolerance
    }

    /// Records `signature` and returns `false` if it was already accepted
    /// within the window.
    pub fn check_replay(&self, signature: &str) -> bool {
        self.replay.check_replay(signature)
    }

    /// Runs all three checks in order and reports the first failure.
    ///
    /// `timestamp` is only evaluated once the signature has been verified,
    /// which lets callers read the timestamp out of the body itself without
    /// trusting unauthenticated content.
    pub fn verify<F>(&self, raw_body: &[u8], signature: Option<&str>, timestamp: F) -> Verdict
    where
        F: FnOnce() -> Option<i64>,
    {
        self.verify_at(raw_body, signature, timestamp, Utc::now())
    }

    /// Like [`verify`](Self::verify), at an explicit time.
    pub fn verify_at<F>(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
        timestamp: F,
        now: DateTime<Utc>,
    ) -> Verdict
    where
        F: FnOnce() -> Option<i64>,
    {
        let signature = match signature {
            Some(s) if self.verify_signature(raw_body, Some(s)) => s,
            _ => return Verdict::BadSignature,
        };
        if !self.check_timestamp_at(timestamp(), now) {
            return Verdict::StaleTimestamp;
        }
        if !self.replay.check_replay_at(signature, now) {
            return Verdict::Replayed;
        }
        Verdict::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhooks::{compute_signature, format_signature_header};

    const SECRET: &[u8] = b"lin_wh_secret";

    fn sign(body: &[u8]) -> String {
        format_signature_header(&compute_signature(body, SECRET))
    }

    fn millis(t: DateTime<Utc>) -> Option<i64> {
        Some(t.timestamp_millis())
    }

    #[test]
    fn timestamp_window_is_two_sided() {
        let verifier = WebhookVerifier::with_tolerance(SECRET, TimeDelta::seconds(60));
        let now = Utc::now();

        assert!(verifier.check_timestamp_at(millis(now), now));
        assert!(verifier.check_timestamp_at(millis(now - TimeDelta::seconds(60)), now));
        assert!(verifier.check_timestamp_at(millis(now + TimeDelta::seconds(60)), now));
        assert!(!verifier.check_timestamp_at(millis(now - TimeDelta::seconds(61)), now));
        assert!(!verifier.check_timestamp_at(millis(now + TimeDelta::seconds(61)), now));
    }

    #[test]
    fn missing_or_absurd_timestamp_is_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        assert!(!verifier.check_timestamp(None));
        assert!(!verifier.check_timestamp(Some(i64::MAX)));
        assert!(!verifier.check_timestamp(Some(0)));
    }

    #[test]
    fn accepted_delivery() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = br#"{"action":"create"}"#;
        let now = Utc::now();

        let verdict = verifier.verify_at(body, Some(&sign(body)), || millis(now), now);
        assert_eq!(verdict, Verdict::Accepted);
        assert!(verdict.is_accepted());
    }

    #[test]
    fn identical_redelivery_is_rejected_as_replay() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = br#"{"action":"create"}"#;
        let sig = sign(body);
        let now = Utc::now();

        assert_eq!(
            verifier.verify_at(body, Some(&sig), || millis(now), now),
            Verdict::Accepted
        );
        assert_eq!(
            verifier.verify_at(body, Some(&sig), || millis(now), now),
            Verdict::Replayed
        );
    }

    #[test]
    fn future_dated_redelivery_is_rejected_after_first_window() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = br#"{"action":"create"}"#;
        let sig = sign(body);
        let t0 = Utc::now();
        let claimed = t0 + TimeDelta::seconds(290);

        assert_eq!(
            verifier.verify_at(body, Some(&sig), || millis(claimed), t0),
            Verdict::Accepted
        );
        // Still fresh (20s before the claimed time), but older than one
        // tolerance window since first seen.
        assert_eq!(
            verifier.verify_at(
                body,
                Some(&sig),
                || millis(claimed),
                t0 + TimeDelta::seconds(310)
            ),
            Verdict::Replayed
        );
    }

    #[test]
    fn replay_memory_covers_whole_freshness_span() {
        let verifier = WebhookVerifier::with_tolerance(SECRET, TimeDelta::seconds(60));
        assert_eq!(verifier.replay.retention(), TimeDelta::seconds(120));
    }

    #[test]
    fn bad_signature_skips_timestamp_and_replay() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = br#"{"action":"create"}"#;
        let forged = format_signature_header(&compute_signature(body, b"other"));
        let mut timestamp_read = false;

        let verdict = verifier.verify(body, Some(&forged), || {
            timestamp_read = true;
            None
        });

        assert_eq!(verdict, Verdict::BadSignature);
        assert!(!timestamp_read);
        assert!(verifier.replay.is_empty());
    }

    #[test]
    fn missing_signature_is_bad_signature() {
        let verifier = WebhookVerifier::new(SECRET);
        assert_eq!(
            verifier.verify(b"{}", None, || Some(0)),
            Verdict::BadSignature
        );
    }

    #[test]
    fn stale_timestamp_does_not_poison_replay_cache() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = br#"{"action":"update"}"#;
        let sig = sign(body);
        let now = Utc::now();
        let stale = now - TimeDelta::minutes(30);

        assert_eq!(
            verifier.verify_at(body, Some(&sig), || millis(stale), now),
            Verdict::StaleTimestamp
        );
        assert!(verifier.replay.is_empty());

        // The same signature with a fresh timestamp is still accepted once.
        assert_eq!(
            verifier.verify_at(body, Some(&sig), || millis(now), now),
            Verdict::Accepted
        );
    }

    #[test]
    fn one_byte_difference_fails_signature() {
        let verifier = WebhookVerifier::new(SECRET);
        let body = br#"{"priority":1}"#;
        let sig = sign(body);
        assert!(verifier.verify_signature(body, Some(&sig)));
        assert!(!verifier.verify_signature(br#"{"priority":2}"#, Some(&sig)));
    }

    #[test]
    fn check_replay_is_exposed_directly() {
        let verifier = WebhookVerifier::new(SECRET);
        assert!(verifier.check_replay("abc"));
        assert!(!verifier.check_replay("abc"));
    }
}
