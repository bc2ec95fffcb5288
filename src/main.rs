use std::process::ExitCode;
use std::sync::Arc;

use autopilot::config::Config;
use autopilot::ingest::IngestionAdapter;
use autopilot::queue::TaskQueue;
use autopilot::server::{AppState, build_router};
use autopilot::webhooks::WebhookVerifier;
use autopilot::worker::SlotPool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autopilot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let queue = Arc::new(TaskQueue::new(config.queue_config()));
    let verifier = Arc::new(WebhookVerifier::with_tolerance(
        config.webhook_secret.clone(),
        config.timestamp_tolerance,
    ));
    let labels = config.static_labels();
    if labels.is_empty() {
        warn!("AUTOPILOT_LABELS is empty; no issue can carry the trigger label");
    }
    let adapter = IngestionAdapter::new(verifier, queue.clone(), labels, config.ingest.clone());

    let shutdown = CancellationToken::new();
    let pool = config.executor().map(|executor| {
        SlotPool::spawn(
            queue.clone(),
            Arc::new(executor),
            config.max_concurrency,
            shutdown.child_token(),
        )
    });
    if pool.is_none() {
        info!("No executor command configured; tasks are dispatched over HTTP only");
    }

    let app = build_router(AppState::new(adapter));

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %config.bind_addr, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };
    info!("listening on {}", config.bind_addr);

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await;

    if let Some(pool) = pool {
        pool.shutdown().await;
    }

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
