//! Liveness endpoint.
//!
//! Answers as long as the process is serving HTTP. It deliberately ignores
//! queue state: a paused or backed-up queue is still a live process.

use axum::http::StatusCode;

/// `GET /health` → `200 OK` with body `OK`.
pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        assert_eq!(health_handler().await, (StatusCode::OK, "OK"));
    }
}
