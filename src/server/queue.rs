//! Queue and task endpoints.
//!
//! These routes let operators inspect and pause the queue, and let an
//! out-of-process executor pull tasks and report their outcomes.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use super::AppState;
use crate::ingest::LabelResolver;
use crate::queue::{QueueError, QueueStatus};
use crate::types::{Task, TaskId, TaskOutcome, TaskStatus, TaskSummary, UnknownStatus};

/// Errors returned by the queue routes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("malformed task id: {0}")]
    MalformedId(String),

    #[error("invalid status filter: {0}")]
    InvalidFilter(#[from] UnknownStatus),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MalformedId(_) | ApiError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            ApiError::Queue(QueueError::TaskNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Queue(QueueError::NotActive { .. }) => StatusCode::CONFLICT,
            ApiError::Queue(QueueError::DuplicateTask(_)) => StatusCode::CONFLICT,
        };

        (status, self.to_string()).into_response()
    }
}

/// Query string for the task list.
#[derive(Debug, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<String>,
}

fn parse_id(raw: &str) -> Result<TaskId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::MalformedId(raw.to_string()))
}

/// `GET /api/v1/queue`
pub async fn status_handler<R>(State(app_state): State<AppState<R>>) -> Json<QueueStatus>
where
    R: LabelResolver + Send + Sync + 'static,
{
    Json(app_state.queue().status())
}

/// `POST /api/v1/queue/pause`
pub async fn pause_handler<R>(State(app_state): State<AppState<R>>) -> Json<QueueStatus>
where
    R: LabelResolver + Send + Sync + 'static,
{
    app_state.queue().pause();
    Json(app_state.queue().status())
}

/// `POST /api/v1/queue/resume`
pub async fn resume_handler<R>(State(app_state): State<AppState<R>>) -> Json<QueueStatus>
where
    R: LabelResolver + Send + Sync + 'static,
{
    app_state.queue().resume();
    Json(app_state.queue().status())
}

/// `POST /api/v1/queue/next`
///
/// Dispatches the next task to the caller. Returns 204 when the queue is
/// paused, empty, or every slot is busy.
pub async fn next_handler<R>(State(app_state): State<AppState<R>>) -> Response
where
    R: LabelResolver + Send + Sync + 'static,
{
    match app_state.queue().try_dispatch() {
        Some(task) => {
            info!(task_id = %task.id(), "Task handed to remote executor");
            Json(task).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// `GET /api/v1/tasks?status=`
pub async fn list_tasks_handler<R>(
    State(app_state): State<AppState<R>>,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<Vec<TaskSummary>>, ApiError>
where
    R: LabelResolver + Send + Sync + 'static,
{
    let status = filter
        .status
        .as_deref()
        .map(str::parse::<TaskStatus>)
        .transpose()?;

    let tasks = app_state.queue().tasks(status);
    Ok(Json(tasks.iter().map(TaskSummary::from).collect()))
}

/// `GET /api/v1/tasks/{id}`
pub async fn get_task_handler<R>(
    State(app_state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError>
where
    R: LabelResolver + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    Ok(Json(app_state.queue().task(id)?))
}

/// `POST /api/v1/tasks/{id}/result`
///
/// Body is a [`TaskOutcome`]: `{"outcome":"success"}` or
/// `{"outcome":"failure","reason":"...","retryable":true}`.
pub async fn report_result_handler<R>(
    State(app_state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(outcome): Json<TaskOutcome>,
) -> Result<Json<Task>, ApiError>
where
    R: LabelResolver + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    match app_state.queue().report_result(id, outcome) {
        Ok(task) => Ok(Json(task)),
        Err(e) => {
            warn!(task_id = %id, error = %e, "Result report refused");
            Err(e.into())
        }
    }
}
