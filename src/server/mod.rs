//! HTTP server for the autopilot service.
//!
//! This module implements the HTTP server that:
//! - Accepts tracker webhooks, runs them through the verification gate and
//!   enqueues qualifying issues
//! - Exposes the queue to operators and out-of-process executors
//! - Provides health checks for liveness probes
//!
//! # Endpoints
//!
//! - `POST /webhook` - Tracker webhook deliveries
//! - `GET /api/v1/queue` - Queue status snapshot
//! - `POST /api/v1/queue/pause`, `POST /api/v1/queue/resume`
//! - `POST /api/v1/queue/next` - Dispatch the next task, if a slot is free
//! - `GET /api/v1/tasks` - Task summaries, optionally `?status=`
//! - `GET /api/v1/tasks/{id}` - One task
//! - `POST /api/v1/tasks/{id}/result` - Report an attempt's outcome
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

use tower_http::trace::TraceLayer;

use crate::ingest::{IngestionAdapter, LabelResolver, StaticLabels};
use crate::queue::TaskQueue;

pub mod health;
pub mod queue;
pub mod webhook;

pub use health::health_handler;
pub use queue::ApiError;
pub use webhook::{WebhookError, webhook_handler};

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
pub struct AppState<R = StaticLabels> {
    inner: Arc<AppStateInner<R>>,
}

struct AppStateInner<R> {
    adapter: IngestionAdapter<R>,
}

// Manual impl: cloning the handle never requires cloning the resolver.
impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> AppState<R> {
    pub fn new(adapter: IngestionAdapter<R>) -> Self {
        AppState {
            inner: Arc::new(AppStateInner { adapter }),
        }
    }

    /// Returns the ingestion adapter.
    pub fn adapter(&self) -> &IngestionAdapter<R> {
        &self.inner.adapter
    }
}

impl<R: LabelResolver + Sync> AppState<R> {
    /// Returns the task queue the adapter feeds.
    pub fn queue(&self) -> &TaskQueue {
        self.inner.adapter.queue()
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<R>(app_state: AppState<R>) -> axum::Router
where
    R: LabelResolver + Send + Sync + 'static,
{
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler::<R>))
        .route("/api/v1/queue", get(queue::status_handler::<R>))
        .route("/api/v1/queue/pause", post(queue::pause_handler::<R>))
        .route("/api/v1/queue/resume", post(queue::resume_handler::<R>))
        .route("/api/v1/queue/next", post(queue::next_handler::<R>))
        .route("/api/v1/tasks", get(queue::list_tasks_handler::<R>))
        .route("/api/v1/tasks/{id}", get(queue::get_task_handler::<R>))
        .route(
            "/api/v1/tasks/{id}/result",
            post(queue::report_result_handler::<R>),
        )
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::IngestConfig;
    use crate::webhooks::WebhookVerifier;

    fn state() -> AppState {
        AppState::new(IngestionAdapter::new(
            Arc::new(WebhookVerifier::new(b"secret".to_vec())),
            Arc::new(TaskQueue::default()),
            StaticLabels::new(),
            IngestConfig::default(),
        ))
    }

    #[test]
    fn app_state_accessors_work() {
        let state = state();
        assert!(state.queue().is_empty());
        assert_eq!(state.adapter().config(), &IngestConfig::default());
    }

    #[test]
    fn app_state_clones_share_the_queue() {
        let state = state();
        let cloned = state.clone();

        state.queue().pause();
        assert!(cloned.queue().is_paused());
    }
}
