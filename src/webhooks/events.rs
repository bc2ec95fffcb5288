//! Issue-tracker webhook payloads.
//!
//! Only the fields the ingestion adapter needs are modelled. Unknown fields
//! are ignored so new tracker fields never break parsing.
//!
//! # Example payload
//!
//! ```json
//! {
//!   "action": "update",
//!   "type": "Issue",
//!   "webhookTimestamp": 1700000000000,
//!   "data": {
//!     "id": "9cfb482a-...",
//!     "identifier": "ENG-42",
//!     "title": "Fix login redirect",
//!     "description": "...",
//!     "priority": 2,
//!     "labelIds": ["lbl-1"],
//!     "state": { "name": "Todo" }
//!   },
//!   "updatedFrom": { "stateId": "..." }
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Action performed on the entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Create,
    Update,
    Remove,
    #[serde(other)]
    Other,
}

/// Top-level webhook envelope.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub action: EventAction,

    /// Entity type, e.g. `Issue`, `Comment`, `Project`.
    #[serde(rename = "type")]
    pub entity_type: String,

    /// Send time in milliseconds since the Unix epoch.
    pub webhook_timestamp: Option<i64>,

    /// The entity after the change. Kept raw so non-issue events still parse.
    #[serde(default)]
    pub data: serde_json::Value,

    /// Previous values of the fields an update changed.
    pub updated_from: Option<UpdatedFrom>,
}

impl WebhookPayload {
    pub fn is_issue(&self) -> bool {
        self.entity_type == "Issue"
    }
}

/// Issue entity as carried in `data`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueData {
    pub id: String,

    /// Human-facing key such as `ENG-42`. Falls back to `id` when absent.
    pub identifier: Option<String>,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Tracker priority: 0 none, 1 urgent, 2 high, 3 medium, 4 low.
    #[serde(default)]
    pub priority: u8,

    #[serde(default)]
    pub label_ids: Vec<String>,

    pub state: Option<WorkflowState>,
}

impl IssueData {
    /// The identifier tasks are keyed by.
    pub fn source_id(&self) -> &str {
        self.identifier.as_deref().unwrap_or(&self.id)
    }

    pub fn state_name(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkflowState {
    pub name: String,
}

/// Fields changed by an update. Presence of a key means it changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedFrom {
    pub state_id: Option<String>,
    pub label_ids: Option<Vec<String>>,
}

impl UpdatedFrom {
    /// True if the update moved the issue between states or touched its labels.
    pub fn touches_routing(&self) -> bool {
        self.state_id.is_some() || self.label_ids.is_some()
    }
}

/// Minimal view used to read the send time once the signature is verified.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimestampOnly {
    webhook_timestamp: Option<i64>,
}

/// Reads `webhookTimestamp` from a raw body without parsing the rest.
pub fn peek_timestamp(raw_body: &[u8]) -> Option<i64> {
    serde_json::from_slice::<TimestampOnly>(raw_body)
        .ok()?
        .webhook_timestamp
}
