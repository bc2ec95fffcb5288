//! Task execution.
//!
//! The queue only tracks task state; the work itself is done by an
//! [`Executor`]. Two ways of driving execution exist:
//!
//! - In-process: a [`SlotPool`] runs one loop per execution slot. Each loop
//!   waits for the queue to dispatch a task, hands it to the executor and
//!   reports the outcome.
//! - Out-of-process: an external agent pulls tasks through the HTTP API and
//!   posts results back. No pool runs in that mode.
//!
//! # Architecture
//!
//! ```text
//!   webhook ──► ingest ──► TaskQueue ──► slot 0 ──► Executor
//!                             ▲     └──► slot 1 ──► Executor
//!                             │                        │
//!                             └──── report_result ◄────┘
//! ```

use std::future::Future;

use crate::types::{Task, TaskOutcome};

pub mod command;
pub mod pool;


pub use command::CommandExecutor;
pub use pool::SlotPool;

/// Performs the work described by a task.
///
/// Implementations classify their own failures as retryable or not; the
/// queue decides whether attempts remain. There is no timeout imposed from
/// outside, so an executor that can hang must bound itself and report a
/// failure.
///
/// # Example (mock for testing)
///
/// ```ignore
/// struct AlwaysSucceeds;
///
/// impl Executor for AlwaysSucceeds {
///     async fn execute(&self, _task: &Task) -> TaskOutcome {
///         TaskOutcome::Success
///     }
/// }
/// ```
pub trait Executor {
    /// Runs one attempt of `task`.
    fn execute(&self, task: &Task) -> impl Future<Output = TaskOutcome> + Send;
}
