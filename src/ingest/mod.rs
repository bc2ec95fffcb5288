//! Ingestion: from a signed tracker delivery to an enqueued task.
//!
//! The adapter is the only code that knows the tracker's payload shape. For
//! each delivery it:
//!
//! 1. Runs the verification gate (signature, then timestamp, then replay).
//!    Nothing in the body is trusted before this passes.
//! 2. Screens the envelope: issue creates, or updates that moved the issue
//!    between states or changed its labels.
//! 3. Resolves label ids to names and checks for the trigger label.
//! 4. Checks the workflow state against the trigger states.
//! 5. Builds a task and enqueues it unless the issue already has an open task.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::queue::{QueueError, TaskQueue};
use crate::types::{DEFAULT_MAX_ATTEMPTS, TaskDraft, TaskId, TaskValidationError};
use crate::webhooks::{IssueData, Verdict, WebhookPayload, WebhookVerifier, peek_timestamp};

pub mod labels;
pub mod mapping;

pub use labels::{LabelResolver, StaticLabels};
pub use mapping::{IgnoreReason, map_priority, screen_envelope};

use mapping::contains_ignore_case;

/// Default label that opts an issue into automation.
pub const DEFAULT_TRIGGER_LABEL: &str = "autopilot";

/// Default workflow state an issue must be in to be picked up.
pub const DEFAULT_TRIGGER_STATE: &str = "Todo";

/// Routing rules for the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Label name (case-insensitive) an issue must carry.
    pub trigger_label: String,
    /// Workflow state names (case-insensitive) that qualify. Empty accepts any state.
    pub trigger_states: Vec<String>,
    /// Retry ceiling given to new tasks.
    pub max_attempts: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            trigger_label: DEFAULT_TRIGGER_LABEL.to_string(),
            trigger_states: vec![DEFAULT_TRIGGER_STATE.to_string()],
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Errors that stop a delivery from being processed.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The delivery failed verification. Its content was not inspected.
    #[error("webhook rejected: {}", .0.as_str())]
    Rejected(Verdict),

    /// The verified body is not a payload we understand.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// The label resolver failed.
    #[error("label lookup failed: {0}")]
    LabelLookup(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The issue could not be turned into a valid task.
    #[error("invalid task: {0}")]
    Validation(#[from] TaskValidationError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

/// What happened to a verified delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Enqueued(TaskId),
    Ignored(IgnoreReason),
}

/// Turns verified tracker deliveries into queued tasks.
#[derive(Debug)]
pub struct IngestionAdapter<R> {
    verifier: Arc<WebhookVerifier>,
    queue: Arc<TaskQueue>,
    labels: R,
    config: IngestConfig,
}

impl<R: LabelResolver + Sync> IngestionAdapter<R> {
    pub fn new(
        verifier: Arc<WebhookVerifier>,
        queue: Arc<TaskQueue>,
        labels: R,
        config: IngestConfig,
    ) -> Self {
        IngestionAdapter {
            verifier,
            queue,
            labels,
            config,
        }
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Processes one delivery from its raw body and signature header.
    #[instrument(skip_all)]
    pub async fn ingest(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<IngestOutcome, IngestError> {
        let verdict = self
            .verifier
            .verify(raw_body, signature, || peek_timestamp(raw_body));
        if !verdict.is_accepted() {
            warn!(reason = verdict.as_str(), "Webhook rejected");
            return Err(IngestError::Rejected(verdict));
        }

        let payload: WebhookPayload = serde_json::from_slice(raw_body)?;
        if let Err(reason) = screen_envelope(&payload) {
            debug!(
                reason = reason.as_str(),
                entity_type = %payload.entity_type,
                "Event ignored"
            );
            return Ok(IngestOutcome::Ignored(reason));
        }

        let issue: IssueData = serde_json::from_value(payload.data)?;
        self.route_issue(issue).await
    }

    async fn route_issue(&self, issue: IssueData) -> Result<IngestOutcome, IngestError> {
        let source_id = issue.source_id().to_string();

        let label_names = self
            .labels
            .resolve(&issue.label_ids)
            .await
            .map_err(|e| IngestError::LabelLookup(Box::new(e)))?;

        if !contains_ignore_case(&label_names, &self.config.trigger_label) {
            debug!(source_id = %source_id, "Issue lacks trigger label");
            return Ok(IngestOutcome::Ignored(IgnoreReason::MissingTriggerLabel));
        }

        let state_ok = self.config.trigger_states.is_empty()
            || issue
                .state_name()
                .is_some_and(|s| contains_ignore_case(&self.config.trigger_states, s));
        if !state_ok {
            debug!(
                source_id = %source_id,
                state = issue.state_name().unwrap_or_default(),
                "Issue not in a trigger state"
            );
            return Ok(IngestOutcome::Ignored(IgnoreReason::StateNotTriggered));
        }

        let task = TaskDraft::new(source_id.clone(), issue.title)
            .description(issue.description.unwrap_or_default())
            .tags(label_names)
            .priority(map_priority(issue.priority))
            .max_attempts(self.config.max_attempts)
            .build()?;

        match self.queue.enqueue_unique_source(task)? {
            Some(id) => {
                info!(task_id = %id, source_id = %source_id, "Issue enqueued");
                Ok(IngestOutcome::Enqueued(id))
            }
            None => Ok(IngestOutcome::Ignored(IgnoreReason::AlreadyQueued)),
        }
    }
}
