//! In-memory priority task queue with bounded execution slots.
//!
//! The queue owns every task once it is enqueued and is the only writer of
//! lifecycle state. Callers get clones back.
//!
//! # Concurrency
//!
//! All state (the task arena, the ready heap, the active count and the paused
//! flag) sits behind one mutex. Every operation, reads included, takes that
//! lock, so no caller can observe a task mid-transition and status counts
//! always add up. No operation awaits or does I/O while holding it.
//!
//! Dispatch is pull-based. [`TaskQueue::try_dispatch`] returns a task only
//! if the queue is running, a slot is free and something is pending.
//! [`TaskQueue::next`] waits until that is the case. Waiters are woken on
//! enqueue, on resume, and whenever a result frees a slot.
//!
//! # Dispatch order
//!
//! Strict priority tiers, FIFO by creation time within a tier, enqueue order
//! for exact ties. A retried task keeps its original place.

use std::collections::{BinaryHeap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::types::{SourceId, Task, TaskId, TaskOutcome, TaskStatus};

pub mod error;
mod ready;
pub mod status;


pub use error::{QueueError, Result};
pub use status::QueueStatus;

use ready::ReadyEntry;
use status::Counts;

/// Number of execution slots when none is configured.
pub const DEFAULT_MAX_CONCURRENCY: usize = 1;

/// Queue tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Upper bound on simultaneously active tasks. Always at least 1.
    pub max_concurrency: usize,
}

impl QueueConfig {
    pub fn new(max_concurrency: usize) -> Self {
        QueueConfig {
            max_concurrency: max_concurrency.max(1),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

/// A task plus the bookkeeping the queue keeps alongside it.
#[derive(Debug)]
struct Entry {
    task: Task,
    /// Enqueue order, used as the final dispatch tie-breaker.
    sequence: u64,
}

impl Entry {
    fn ready_entry(&self) -> ReadyEntry {
        ReadyEntry {
            id: self.task.id(),
            priority: self.task.priority(),
            created_at: self.task.created_at(),
            sequence: self.sequence,
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    tasks: HashMap<TaskId, Entry>,
    /// Ids of pending tasks. Every pending task has exactly one entry here.
    ready: BinaryHeap<ReadyEntry>,
    /// Pending or active task count per source. Sources with none are absent.
    open_sources: HashMap<SourceId, usize>,
    active: usize,
    paused: bool,
    next_sequence: u64,
}

impl QueueState {
    /// Forgets one open task for `source`, after it reached a terminal state.
    fn close_source(&mut self, source: &SourceId) {
        if let Some(open) = self.open_sources.get_mut(source) {
            *open -= 1;
            if *open == 0 {
                self.open_sources.remove(source);
            }
        }
    }
}

/// The shared task queue.
///
/// Wrap in an `Arc` to share between the HTTP layer and executors.
#[derive(Debug)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    config: QueueConfig,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl TaskQueue {
    pub fn new(config: QueueConfig) -> Self {
        TaskQueue {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            config,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn config(&self) -> QueueConfig {
        self.config
    }

    // Queue invariants are restored before any point that could panic, so a
    // poisoned lock still guards consistent state.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a freshly built task in `pending` state.
    ///
    /// Fails only if a task with the same id is already held, which means a
    /// clone handed out by the queue was enqueued again.
    pub fn enqueue(&self, task: Task) -> Result<TaskId> {
        let id = task.id();
        let priority = task.priority();
        Self::insert(&mut self.lock(), task)?;

        info!(task_id = %id, priority = %priority, "Task enqueued");
        self.notify.notify_waiters();
        Ok(id)
    }

    /// Like [`enqueue`](Self::enqueue), but skips the task if another task
    /// for the same source is still pending or active.
    ///
    /// The check and the insert happen under one lock, so concurrent
    /// deliveries for one issue yield at most one open task. Returns
    /// `Ok(None)` when the task was skipped.
    pub fn enqueue_unique_source(&self, task: Task) -> Result<Option<TaskId>> {
        let id = task.id();
        let priority = task.priority();
        {
            let mut state = self.lock();
            if state.open_sources.contains_key(task.source_id()) {
                debug!(source_id = %task.source_id(), "Source already has an open task");
                return Ok(None);
            }
            Self::insert(&mut state, task)?;
        }

        info!(task_id = %id, priority = %priority, "Task enqueued");
        self.notify.notify_waiters();
        Ok(Some(id))
    }

    fn insert(state: &mut QueueState, task: Task) -> Result<()> {
        let id = task.id();
        if state.tasks.contains_key(&id) {
            return Err(QueueError::DuplicateTask(id));
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        *state
            .open_sources
            .entry(task.source_id().clone())
            .or_insert(0) += 1;

        let entry = Entry { task, sequence };
        state.ready.push(entry.ready_entry());
        state.tasks.insert(id, entry);
        Ok(())
    }

    /// Dispatches the next task if the queue is running and a slot is free.
    ///
    /// The returned task is already `active` with its attempt counted.
    pub fn try_dispatch(&self) -> Option<Task> {
        let task = {
            let mut state = self.lock();
            if state.paused || state.active >= self.config.max_concurrency {
                return None;
            }
            let next = state.ready.pop()?;
            let now = Utc::now();

            let entry = state.tasks.get_mut(&next.id)?;
            if let Err(e) = entry.task.begin_attempt(now) {
                // Only pending tasks are ever pushed onto the heap.
                warn!(task_id = %next.id, error = %e, "Ready entry for non-pending task");
                return None;
            }
            let task = entry.task.clone();
            state.active += 1;
            task
        };

        debug!(
            task_id = %task.id(),
            priority = %task.priority(),
            attempt = task.attempt(),
            max_attempts = task.max_attempts(),
            "Task dispatched"
        );
        Some(task)
    }

    /// Waits until a task can be dispatched, then dispatches it.
    ///
    /// Cancel-safe: if the future is dropped, no task is lost.
    pub async fn next(&self) -> Task {
        loop {
            let mut notified = std::pin::pin!(self.notify.notified());
            // Register before checking so a wakeup between the check and the
            // await is not missed.
            notified.as_mut().enable();

            if let Some(task) = self.try_dispatch() {
                return task;
            }
            notified.await;
        }
    }

    /// Records the outcome of an active task's current attempt and frees its slot.
    ///
    /// Returns the task after the transition: `completed`, `failed`, or back
    /// to `pending` for a retryable failure with attempts left.
    pub fn report_result(&self, id: TaskId, outcome: TaskOutcome) -> Result<Task> {
        let task = {
            let mut state = self.lock();
            let entry = state
                .tasks
                .get_mut(&id)
                .ok_or(QueueError::TaskNotFound(id))?;

            let status = entry
                .task
                .record_outcome(&outcome, Utc::now())
                .map_err(|e| QueueError::NotActive { id, status: e.from })?;

            let task = entry.task.clone();
            let requeue = (status == TaskStatus::Pending).then(|| entry.ready_entry());

            state.active -= 1;
            match requeue {
                Some(ready) => state.ready.push(ready),
                None => state.close_source(task.source_id()),
            }
            task
        };

        match task.status() {
            TaskStatus::Completed => {
                info!(task_id = %id, attempt = task.attempt(), "Task completed");
            }
            TaskStatus::Pending => {
                warn!(
                    task_id = %id,
                    attempt = task.attempt(),
                    max_attempts = task.max_attempts(),
                    error = task.error().unwrap_or_default(),
                    "Task failed, will retry"
                );
            }
            _ => {
                warn!(
                    task_id = %id,
                    attempt = task.attempt(),
                    error = task.error().unwrap_or_default(),
                    "Task failed permanently"
                );
            }
        }

        self.notify.notify_waiters();
        Ok(task)
    }

    /// Stops dispatch. Active tasks are unaffected.
    pub fn pause(&self) {
        let was_paused = std::mem::replace(&mut self.lock().paused, true);
        if !was_paused {
            info!("Queue paused");
        }
    }

    /// Restarts dispatch. Pending tasks are eligible immediately.
    pub fn resume(&self) {
        let was_paused = std::mem::replace(&mut self.lock().paused, false);
        if was_paused {
            info!("Queue resumed");
            self.notify.notify_waiters();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Consistent snapshot of per-status counts.
    pub fn status(&self) -> QueueStatus {
        let state = self.lock();
        let mut counts = Counts::default();
        for entry in state.tasks.values() {
            counts.add(entry.task.status());
        }
        debug_assert_eq!(counts.active, state.active);
        debug_assert_eq!(counts.pending, state.ready.len());
        debug_assert_eq!(
            counts.pending + counts.active,
            state.open_sources.values().sum::<usize>()
        );

        QueueStatus {
            pending: counts.pending,
            active: counts.active,
            completed: counts.completed,
            failed: counts.failed,
            total: counts.total(),
            paused: state.paused,
            max_concurrency: self.config.max_concurrency,
            started_at: self.started_at,
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }

    /// All tasks, optionally filtered by status, in enqueue order.
    pub fn tasks(&self, filter: Option<TaskStatus>) -> Vec<Task> {
        let state = self.lock();
        let mut entries: Vec<&Entry> = state
            .tasks
            .values()
            .filter(|e| filter.is_none_or(|s| e.task.status() == s))
            .collect();
        entries.sort_by_key(|e| e.sequence);
        entries.into_iter().map(|e| e.task.clone()).collect()
    }

    /// Looks up one task.
    pub fn task(&self, id: TaskId) -> Result<Task> {
        self.lock()
            .tasks
            .get(&id)
            .map(|e| e.task.clone())
            .ok_or(QueueError::TaskNotFound(id))
    }

    /// Total number of tasks ever enqueued.
    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
