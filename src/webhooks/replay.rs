//! Replay detection for signed webhook deliveries.
//!
//! Webhook senders deliver at least once, and an attacker who captures a
//! signed request can resend it verbatim. Both produce a request with a
//! signature we have already accepted. The cache remembers each accepted
//! signature for as long as its timestamp could still pass the freshness
//! check; after that, the timestamp check rejects it on its own.
//!
//! # Expiry
//!
//! Entries are swept lazily on every call rather than by a background timer,
//! so the cache never grows beyond the signatures seen in one retention
//! window.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};

/// Time-bounded set of accepted signatures.
#[derive(Debug)]
pub struct ReplayCache {
    retention: TimeDelta,
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ReplayCache {
    /// Creates an empty cache that remembers signatures for `retention`.
    pub fn new(retention: TimeDelta) -> Self {
        ReplayCache {
            retention,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the retention window.
    pub fn retention(&self) -> TimeDelta {
        self.retention
    }

    /// Records `signature` and returns `true` if it has not been seen within
    /// the retention window. Returns `false` for a replay.
    pub fn check_replay(&self, signature: &str) -> bool {
        self.check_replay_at(signature, Utc::now())
    }

    /// Like [`check_replay`](Self::check_replay), at an explicit time.
    pub fn check_replay_at(&self, signature: &str, now: DateTime<Utc>) -> bool {
        let key = replay_key(signature);
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);

        prune_expired(&mut seen, now - self.retention);

        if seen.contains_key(&key) {
            return false;
        }
        seen.insert(key, now);
        true
    }

    /// Number of signatures currently remembered.
    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drops every entry first seen at or before `cutoff`.
fn prune_expired(seen: &mut HashMap<String, DateTime<Utc>>, cutoff: DateTime<Utc>) {
    seen.retain(|_, first_seen| *first_seen > cutoff);
}

/// Canonical form of a signature header, so `sha256=AB..` and `ab..` collide.
fn replay_key(signature: &str) -> String {
    let signature = signature.trim();
    signature
        .strip_prefix("sha256=")
        .unwrap_or(signature)
        .to_ascii_lowercase()
}
