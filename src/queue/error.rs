//! Errors surfaced by queue operations.

use thiserror::Error;

use crate::types::{TaskId, TaskStatus};

/// Errors returned by [`TaskQueue`](super::TaskQueue).
///
/// Expected conditions (an empty queue, a paused queue, a retryable failure)
/// are not errors. These variants all indicate a caller bookkeeping bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// No task with this id was ever enqueued.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// A result was reported for a task that is not currently active.
    #[error("task {id} is {status}, not active")]
    NotActive { id: TaskId, status: TaskStatus },

    /// A task with this id is already in the queue.
    #[error("task already enqueued: {0}")]
    DuplicateTask(TaskId),
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
