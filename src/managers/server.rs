//! HTTP control surface and metrics endpoint

use crate::managers::backup::BackupSet;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Routes mapping one-to-one onto orchestrator operations, plus the
/// metrics export under `metrics_endpoint`.
pub fn router(backup_set: Arc<BackupSet>, metrics_endpoint: &str) -> Router {
    Router::new()
        .route("/run", get(run))
        .route("/start", get(start))
        .route("/initialize", get(initialize))
        .route("/running", get(running))
        .route(metrics_endpoint, get(metrics))
        .with_state(backup_set)
}

/// Bind `address:port` and serve until the process exits
pub async fn serve(router: Router, address: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((address, port))
        .await
        .with_context(|| format!("Failed to listen on {}:{}", address, port))?;
    serve_on(listener, router).await
}

pub async fn serve_on(listener: TcpListener, router: Router) -> Result<()> {
    if let Ok(local) = listener.local_addr() {
        info!(address = %local, "Control server listening");
    }
    axum::serve(listener, router)
        .await
        .context("Control server failed")
}

async fn run(State(set): State<Arc<BackupSet>>) -> &'static str {
    debug!("Received /run");
    if set.run_synchronously().await {
        "done"
    } else {
        "Backup already running"
    }
}

async fn start(State(set): State<Arc<BackupSet>>) -> (StatusCode, String) {
    debug!("Received /start");
    match set.run_asynchronously() {
        Ok(_) => (StatusCode::OK, "Backup started".to_string()),
        Err(e) if e.is_already_running() => (StatusCode::OK, e.to_string()),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {}", e)),
    }
}

async fn initialize(State(set): State<Arc<BackupSet>>) -> (StatusCode, String) {
    debug!("Received /initialize");
    match set.initialize_repository().await {
        Ok(state) => {
            debug!(?state, "Repository ready");
            (StatusCode::OK, "done".to_string())
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {}", e)),
    }
}

async fn running(State(set): State<Arc<BackupSet>>) -> String {
    set.is_running().to_string()
}

async fn metrics(State(set): State<Arc<BackupSet>>) -> impl IntoResponse {
    let Some(collection) = set.metrics() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "no metrics".to_string());
    };
    match collection.encode() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("error: {}", e))
        }
    }
}
