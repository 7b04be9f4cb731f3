// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Read-only status HTTP server.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /` | HTML dashboard polling `/api/status` |
//! | `GET /api/status` | [`Status`](super::Status) as JSON |
//! | `GET /health` | `ok` |
//! | `GET /metrics` | Prometheus text exposition |

use super::{Status, StatusManager};
use crate::metrics;
use crate::shutdown::Shutdown;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

const DASHBOARD_HTML: &str = include_str!("dashboard.html");

/// Router over the shared status manager.
pub fn router(status: Arc<StatusManager>) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/api/status", get(api_status))
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .with_state(status)
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn api_status(State(status): State<Arc<StatusManager>>) -> Json<Status> {
    Json(status.snapshot().await)
}

async fn health() -> &'static str {
    "ok"
}

async fn prometheus_metrics() -> Response {
    match metrics::gather_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

/// Serve until shutdown.
///
/// # Errors
///
/// Returns an error when the server fails while accepting connections.
pub async fn serve(
    listener: TcpListener,
    status: Arc<StatusManager>,
    shutdown: Shutdown,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "Status server listening");
    }
    axum::serve(listener, router(status))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
