//! Dispatch ordering for pending tasks.
//!
//! Pending tasks are ordered by:
//! 1. Priority (critical first)
//! 2. Creation time (earliest first, FIFO within a tier)
//! 3. Enqueue sequence (earliest first, for tasks created in the same instant)
//!
//! A task returning to pending after a retryable failure keeps its original
//! creation time and sequence, so it resumes its old place in line instead of
//! going to the back.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::types::{Priority, TaskId};

/// An entry in the ready heap.
#[derive(Debug, Clone)]
pub(crate) struct ReadyEntry {
    pub id: TaskId,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub sequence: u64,
}

// BinaryHeap is a max-heap, so the FIFO keys compare reversed.
impl PartialEq for ReadyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReadyEntry {}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use proptest::prelude::*;
    use std::collections::BinaryHeap;

    use crate::test_utils::arb_priority;

    fn entry(priority: Priority, created_offset_ms: i64, sequence: u64) -> ReadyEntry {
        let base = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        ReadyEntry {
            id: TaskId::new(),
            priority,
            created_at: base + TimeDelta::milliseconds(created_offset_ms),
            sequence,
        }
    }

    #[test]
    fn higher_priority_pops_first() {
        let mut heap = BinaryHeap::new();
        heap.push(entry(Priority::Normal, 0, 0));
        heap.push(entry(Priority::Critical, 10, 1));
        heap.push(entry(Priority::Low, 5, 2));

        assert_eq!(heap.pop().unwrap().priority, Priority::Critical);
        assert_eq!(heap.pop().unwrap().priority, Priority::Normal);
        assert_eq!(heap.pop().unwrap().priority, Priority::Low);
    }

    #[test]
    fn earlier_creation_wins_within_tier() {
        let mut heap = BinaryHeap::new();
        // Enqueued out of creation order, as a retried task would be.
        heap.push(entry(Priority::High, 50, 7));
        heap.push(entry(Priority::High, 10, 9));

        assert_eq!(heap.pop().unwrap().sequence, 9);
        assert_eq!(heap.pop().unwrap().sequence, 7);
    }

    #[test]
    fn sequence_breaks_timestamp_ties() {
        let mut heap = BinaryHeap::new();
        heap.push(entry(Priority::Normal, 0, 2));
        heap.push(entry(Priority::Normal, 0, 0));
        heap.push(entry(Priority::Normal, 0, 1));

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|e| e.sequence)).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    proptest! {
        /// Popping the heap yields entries sorted by (priority desc, created asc, seq asc).
        #[test]
        fn prop_heap_order(
            specs in prop::collection::vec((arb_priority(), 0i64..20), 0..60)
        ) {
            let entries: Vec<ReadyEntry> = specs
                .iter()
                .enumerate()
                .map(|(i, (p, t))| entry(*p, *t, i as u64))
                .collect();

            let mut heap: BinaryHeap<ReadyEntry> = entries.iter().cloned().collect();
            let popped: Vec<ReadyEntry> = std::iter::from_fn(|| heap.pop()).collect();

            let mut expected = entries;
            expected.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.sequence.cmp(&b.sequence))
            });

            let popped_ids: Vec<TaskId> = popped.iter().map(|e| e.id).collect();
            let expected_ids: Vec<TaskId> = expected.iter().map(|e| e.id).collect();
            prop_assert_eq!(popped_ids, expected_ids);
        }
    }
}
