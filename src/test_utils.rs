//! Shared test utilities and arbitrary generators for property-based testing.

use chrono::{DateTime, TimeDelta, Utc};
use proptest::prelude::*;

use crate::types::{Priority, Task, TaskDraft, TaskOutcome};

pub fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Normal),
        Just(Priority::High),
        Just(Priority::Critical),
    ]
}

pub fn arb_outcome() -> impl Strategy<Value = TaskOutcome> {
    prop_oneof![
        Just(TaskOutcome::Success),
        ("[a-z ]{1,20}", any::<bool>())
            .prop_map(|(reason, retryable)| TaskOutcome::Failure { reason, retryable }),
    ]
}

pub fn arb_max_attempts() -> impl Strategy<Value = u32> {
    1u32..=5
}

/// Fixed reference instant so ordering tests are deterministic.
pub fn base_time() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
}

/// Builds a task with the given priority, created `offset_ms` after [`base_time`].
pub fn task_at(priority: Priority, offset_ms: i64) -> Task {
    TaskDraft::new(format!("ENG-{offset_ms}"), format!("task at {offset_ms}"))
        .priority(priority)
        .build_at(base_time() + TimeDelta::milliseconds(offset_ms))
        .unwrap()
}

/// Builds a task with a specific retry ceiling.
pub fn task_with_attempts(max_attempts: u32) -> Task {
    TaskDraft::new("ENG-1", "retry me")
        .max_attempts(max_attempts)
        .build()
        .unwrap()
}
