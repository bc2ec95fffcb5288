//! Webhook handling for issue-tracker events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - Replay detection with a time-bounded cache
//! - The combined verification gate ([`WebhookVerifier`])
//! - Typed views of the tracker's issue payloads

pub mod events;
pub mod replay;
pub mod signature;
pub mod verifier;

pub use events::{EventAction, IssueData, UpdatedFrom, WebhookPayload, peek_timestamp};
pub use replay::ReplayCache;
pub use signature::{
    compute_signature, format_signature_header, parse_signature_header, verify_signature,
};
pub use verifier::{DEFAULT_TIMESTAMP_TOLERANCE, Verdict, WebhookVerifier};
