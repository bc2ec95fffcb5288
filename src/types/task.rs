//! The task entity and its lifecycle state machine.
//!
//! ```text
//!              dispatch                success
//!   pending ───────────► active ──────────────► completed
//!      ▲                   │
//!      │ retryable failure │ non-retryable failure,
//!      │ attempt < max     │ or attempt == max
//!      └───────────────────┤
//!                          └──────────────────► failed
//! ```
//!
//! `completed` and `failed` are terminal. The queue is the only writer of
//! `status`, `attempt`, `error` and `updated_at`; everything else is fixed
//! when the task is built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::ids::{SourceId, TaskId};
use super::priority::Priority;

/// Retry ceiling used when the caller does not pick one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be dispatched.
    Pending,
    /// Handed to an execution slot.
    Active,
    /// Finished successfully. Terminal.
    Completed,
    /// Failed permanently or ran out of attempts. Terminal.
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::Active,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Active => "active",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown task status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "active" => Ok(TaskStatus::Active),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Result of one execution attempt, as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success,
    Failure {
        reason: String,
        /// Whether another attempt may succeed. Classification is the
        /// executor's call; the queue only enforces the attempt ceiling.
        retryable: bool,
    },
}

impl TaskOutcome {
    pub fn retryable(reason: impl Into<String>) -> Self {
        TaskOutcome::Failure {
            reason: reason.into(),
            retryable: true,
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        TaskOutcome::Failure {
            reason: reason.into(),
            retryable: false,
        }
    }
}

/// Errors raised while building a task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskValidationError {
    #[error("source id must not be empty")]
    EmptySourceId,

    #[error("title must not be empty")]
    EmptyTitle,

    #[error("max_attempts must be at least 1")]
    ZeroMaxAttempts,
}

/// A lifecycle transition that is not allowed from the task's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} a task that is {from}")]
pub struct InvalidTransition {
    pub from: TaskStatus,
    pub action: &'static str,
}

/// A unit of scheduled work.
///
/// Fields are read through accessors. Construction goes through
/// [`TaskDraft`], and lifecycle changes only happen inside the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    id: TaskId,
    source_id: SourceId,
    title: String,
    description: String,
    tags: Vec<String>,
    priority: Priority,
    status: TaskStatus,
    attempt: u32,
    max_attempts: u32,
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Number of attempts started so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Message of the most recent failure, if any.
    ///
    /// Always `None` while the task is active.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// `pending → active`.
    pub(crate) fn begin_attempt(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        if self.status != TaskStatus::Pending {
            return Err(InvalidTransition {
                from: self.status,
                action: "dispatch",
            });
        }
        // Pending tasks always have attempts left: the failure path only
        // returns a task to pending while attempt < max_attempts.
        debug_assert!(self.attempt < self.max_attempts);

        self.status = TaskStatus::Active;
        self.attempt += 1;
        self.error = None;
        self.updated_at = now;
        Ok(())
    }

    /// Applies an execution outcome to an active task and returns the new status.
    pub(crate) fn record_outcome(
        &mut self,
        outcome: &TaskOutcome,
        now: DateTime<Utc>,
    ) -> Result<TaskStatus, InvalidTransition> {
        if self.status != TaskStatus::Active {
            return Err(InvalidTransition {
                from: self.status,
                action: "report a result for",
            });
        }

        self.status = match outcome {
            TaskOutcome::Success => TaskStatus::Completed,
            TaskOutcome::Failure { reason, retryable } => {
                self.error = Some(reason.clone());
                if *retryable && self.attempt < self.max_attempts {
                    TaskStatus::Pending
                } else {
                    TaskStatus::Failed
                }
            }
        };
        self.updated_at = now;
        Ok(self.status)
    }
}

/// Compact view of a task for list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub source_id: SourceId,
    pub title: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub attempt: u32,
    pub max_attempts: u32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        TaskSummary {
            id: task.id,
            source_id: task.source_id.clone(),
            title: task.title.clone(),
            priority: task.priority,
            status: task.status,
            attempt: task.attempt,
            max_attempts: task.max_attempts,
            error: task.error.clone(),
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Builder for new tasks.
///
/// # Example
///
/// ```
/// use autopilot::types::{Priority, TaskDraft, TaskStatus};
///
/// let task = TaskDraft::new("ENG-42", "Fix login redirect")
///     .priority(Priority::High)
///     .tags(["autopilot", "bug", "autopilot"])
///     .build()
///     .unwrap();
///
/// assert_eq!(task.status(), TaskStatus::Pending);
/// assert_eq!(task.attempt(), 0);
/// assert_eq!(task.max_attempts(), 3);
/// assert_eq!(task.tags(), ["autopilot", "bug"]);
/// ```
#[derive(Debug, Clone)]
pub struct TaskDraft {
    source_id: String,
    title: String,
    description: String,
    tags: Vec<String>,
    priority: Priority,
    max_attempts: u32,
}

impl TaskDraft {
    pub fn new(source_id: impl Into<String>, title: impl Into<String>) -> Self {
        TaskDraft {
            source_id: source_id.into(),
            title: title.into(),
            description: String::new(),
            tags: Vec::new(),
            priority: Priority::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Validates the draft and produces a pending task stamped with the current time.
    pub fn build(self) -> Result<Task, TaskValidationError> {
        self.build_at(Utc::now())
    }

    /// Like [`build`](Self::build), with an explicit creation time.
    pub fn build_at(self, now: DateTime<Utc>) -> Result<Task, TaskValidationError> {
        let source_id = self.source_id.trim();
        if source_id.is_empty() {
            return Err(TaskValidationError::EmptySourceId);
        }
        let title = self.title.trim();
        if title.is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        if self.max_attempts == 0 {
            return Err(TaskValidationError::ZeroMaxAttempts);
        }

        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags {
            let tag = tag.trim();
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }

        Ok(Task {
            id: TaskId::new(),
            source_id: SourceId::new(source_id),
            title: title.to_string(),
            description: self.description,
            tags,
            priority: self.priority,
            status: TaskStatus::Pending,
            attempt: 0,
            max_attempts: self.max_attempts,
            error: None,
            created_at: now,
            updated_at: now,
        })
    }
}
