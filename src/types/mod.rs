//! Core domain types for the autopilot queue.
//!
//! These types encode the task lifecycle invariants via the type system:
//! tasks are only built through a validating builder, and only the queue can
//! move them between states.

pub mod ids;
pub mod priority;
pub mod task;

// Re-export commonly used types at the module level
pub use ids::{SourceId, TaskId};
pub use priority::{Priority, UnknownPriority};
pub use task::{
    DEFAULT_MAX_ATTEMPTS, InvalidTransition, Task, TaskDraft, TaskOutcome, TaskStatus,
    TaskSummary, TaskValidationError, UnknownStatus,
};
