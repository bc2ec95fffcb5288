//! Mapping tracker vocabulary onto queue vocabulary.

use serde::Serialize;

use crate::types::Priority;
use crate::webhooks::{EventAction, WebhookPayload};

/// Maps the tracker's 0–4 priority scale onto the four queue tiers.
///
/// | tracker       | queue      |
/// |---------------|------------|
/// | 1 (urgent)    | `critical` |
/// | 2 (high)      | `high`     |
/// | 3 (medium)    | `normal`   |
/// | 4 (low)       | `low`      |
/// | 0 (none), other | `low`    |
pub fn map_priority(tracker_priority: u8) -> Priority {
    match tracker_priority {
        1 => Priority::Critical,
        2 => Priority::High,
        3 => Priority::Normal,
        _ => Priority::Low,
    }
}

/// Why a verified event did not produce a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// The event is about something other than an issue.
    NotAnIssue,
    /// The action is neither a create nor an update.
    UnsupportedAction,
    /// An update that changed neither the workflow state nor the labels.
    RoutingUnchanged,
    /// The issue does not carry the trigger label.
    MissingTriggerLabel,
    /// The issue is not in one of the trigger states.
    StateNotTriggered,
    /// The issue already has a pending or active task.
    AlreadyQueued,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::NotAnIssue => "not_an_issue",
            IgnoreReason::UnsupportedAction => "unsupported_action",
            IgnoreReason::RoutingUnchanged => "routing_unchanged",
            IgnoreReason::MissingTriggerLabel => "missing_trigger_label",
            IgnoreReason::StateNotTriggered => "state_not_triggered",
            IgnoreReason::AlreadyQueued => "already_queued",
        }
    }
}

/// Envelope-level filter: is this an issue create, or an update that could
/// change whether the issue is routed to the queue?
pub fn screen_envelope(payload: &WebhookPayload) -> Result<(), IgnoreReason> {
    if !payload.is_issue() {
        return Err(IgnoreReason::NotAnIssue);
    }
    match payload.action {
        EventAction::Create => Ok(()),
        EventAction::Update => {
            let touches = payload
                .updated_from
                .as_ref()
                .is_some_and(|from| from.touches_routing());
            if touches {
                Ok(())
            } else {
                Err(IgnoreReason::RoutingUnchanged)
            }
        }
        EventAction::Remove | EventAction::Other => Err(IgnoreReason::UnsupportedAction),
    }
}

/// Case-insensitive membership test used for labels and states.
pub(crate) fn contains_ignore_case<S: AsRef<str>>(haystack: &[S], needle: &str) -> bool {
    haystack
        .iter()
        .any(|item| item.as_ref().eq_ignore_ascii_case(needle))
}
