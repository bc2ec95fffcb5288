//! Fixed pool of execution slot loops.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::queue::TaskQueue;
use crate::types::{Task, TaskOutcome};

use super::Executor;

/// Handle to running slot loops.
///
/// Cancelling the token stops each loop from taking new tasks. A task that
/// is mid-execution finishes and has its outcome reported first.
#[derive(Debug)]
pub struct SlotPool {
    loops: JoinSet<()>,
    cancel: CancellationToken,
}

impl SlotPool {
    /// Spawns `slots` loops pulling from `queue`.
    ///
    /// The queue's own concurrency limit still applies. Spawning more loops
    /// than the queue has slots leaves the extras waiting.
    pub fn spawn<E>(
        queue: Arc<TaskQueue>,
        executor: Arc<E>,
        slots: usize,
        cancel: CancellationToken,
    ) -> Self
    where
        E: Executor + Send + Sync + 'static,
    {
        let mut loops = JoinSet::new();
        for slot in 0..slots {
            let queue = queue.clone();
            let executor = executor.clone();
            let cancel = cancel.clone();
            loops.spawn(async move { run_slot(slot, queue, executor, cancel).await });
        }
        info!(slots, "Execution slots started");
        SlotPool { loops, cancel }
    }

    /// Returns the token that stops this pool.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of loops still running.
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Cancels the pool and waits for every loop to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        while let Some(joined) = self.loops.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Execution slot panicked");
            }
        }
        info!("Execution slots stopped");
    }
}

#[instrument(skip(queue, executor, cancel))]
async fn run_slot<E>(
    slot: usize,
    queue: Arc<TaskQueue>,
    executor: Arc<E>,
    cancel: CancellationToken,
) where
    E: Executor + Send + Sync + 'static,
{
    loop {
        let task = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            task = queue.next() => task,
        };

        let id = task.id();
        debug!(task_id = %id, attempt = task.attempt(), "Executing task");
        let outcome = run_isolated(executor.clone(), task).await;

        if let Err(e) = queue.report_result(id, outcome) {
            // The slot loop is the only reporter for tasks it dispatched.
            error!(task_id = %id, error = %e, "Failed to report task result");
        }
    }
    debug!("Slot loop exiting");
}

/// Runs one attempt on its own task so a panicking executor still yields an
/// outcome and the slot is released.
async fn run_isolated<E>(executor: Arc<E>, task: Task) -> TaskOutcome
where
    E: Executor + Send + Sync + 'static,
{
    let id = task.id();
    match tokio::spawn(async move { executor.execute(&task).await }).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(task_id = %id, error = %e, "Executor panicked");
            TaskOutcome::fatal("executor panicked")
        }
    }
}
