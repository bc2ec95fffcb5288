//! Point-in-time queue snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::TaskStatus;

/// Derived view of the queue, computed under the queue lock.
///
/// Counts always sum to `total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub paused: bool,
    pub max_concurrency: usize,
    pub started_at: DateTime<Utc>,
    /// Whole seconds since the queue was created.
    pub uptime_secs: u64,
}

impl QueueStatus {
    /// Returns the count for one status.
    pub fn count(&self, status: TaskStatus) -> usize {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::Active => self.active,
            TaskStatus::Completed => self.completed,
            TaskStatus::Failed => self.failed,
        }
    }

    /// Free execution slots.
    pub fn idle_slots(&self) -> usize {
        self.max_concurrency.saturating_sub(self.active)
    }
}

/// Per-status tally used while building a snapshot.
#[derive(Debug, Default)]
pub(crate) struct Counts {
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

impl Counts {
    pub fn add(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Active => self.active += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.active + self.completed + self.failed
    }
}
