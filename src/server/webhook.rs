//! Webhook endpoint handler.
//!
//! Accepts tracker webhook deliveries and hands the raw body to the
//! ingestion adapter. Verification happens there, before the body is parsed.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use super::AppState;
use crate::ingest::{IgnoreReason, IngestError, IngestOutcome, LabelResolver};
use crate::types::TaskId;
use crate::webhooks::Verdict;

/// Header name for the tracker's HMAC-SHA256 signature.
const HEADER_SIGNATURE: &str = "linear-signature";
/// Header name for the tracker's delivery ID.
const HEADER_DELIVERY: &str = "linear-delivery";

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The delivery failed verification.
    #[error("webhook rejected: {}", .0.as_str())]
    Rejected(Verdict),

    /// The verified body could not be turned into a task.
    #[error("{0}")]
    BadRequest(IngestError),

    /// Label lookup or queue failure.
    #[error("{0}")]
    Internal(IngestError),
}

impl From<IngestError> for WebhookError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Rejected(verdict) => WebhookError::Rejected(verdict),
            IngestError::InvalidPayload(_) | IngestError::Validation(_) => {
                WebhookError::BadRequest(err)
            }
            IngestError::LabelLookup(_) | IngestError::Queue(_) => WebhookError::Internal(err),
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::Rejected(_) => StatusCode::UNAUTHORIZED,
            WebhookError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebhookError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Body returned for a verified delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookResponse {
    Enqueued { task_id: TaskId },
    Ignored { reason: IgnoreReason },
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Headers:
///   - `Linear-Signature`: hex HMAC-SHA256 of the raw body
///   - `Linear-Delivery`: delivery ID, used only for log correlation
/// - Body: JSON webhook payload carrying `webhookTimestamp`
///
/// # Response
///
/// - 202 Accepted: `{"status":"enqueued","task_id":"..."}`
/// - 200 OK: `{"status":"ignored","reason":"..."}`
/// - 400 Bad Request: verified body that is not a usable payload
/// - 401 Unauthorized: bad signature, stale timestamp or replay
/// - 500 Internal Server Error: label lookup or queue failure
pub async fn webhook_handler<R>(
    State(app_state): State<AppState<R>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookResponse>), WebhookError>
where
    R: LabelResolver + Send + Sync + 'static,
{
    let signature = get_header(&headers, HEADER_SIGNATURE);
    let delivery_id = get_header(&headers, HEADER_DELIVERY).unwrap_or("-");

    debug!(delivery_id = %delivery_id, "Received webhook");

    match app_state.adapter().ingest(&body, signature).await {
        Ok(IngestOutcome::Enqueued(task_id)) => {
            info!(delivery_id = %delivery_id, task_id = %task_id, "Webhook enqueued a task");
            Ok((
                StatusCode::ACCEPTED,
                Json(WebhookResponse::Enqueued { task_id }),
            ))
        }
        Ok(IngestOutcome::Ignored(reason)) => {
            debug!(delivery_id = %delivery_id, reason = reason.as_str(), "Webhook ignored");
            Ok((StatusCode::OK, Json(WebhookResponse::Ignored { reason })))
        }
        Err(e) => {
            let err = WebhookError::from(e);
            if matches!(err, WebhookError::Internal(_)) {
                error!(delivery_id = %delivery_id, error = %err, "Webhook processing failed");
            } else {
                debug!(delivery_id = %delivery_id, error = %err, "Webhook refused");
            }
            Err(err)
        }
    }
}

/// Extracts an optional header value as a string.
fn get_header<'a>(headers: &'a HeaderMap, name: &'static str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
