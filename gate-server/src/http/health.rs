//! Health check endpoint.

use super::AppState;
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Global start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call once at startup).
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// `ok` while a session is ready, `degraded` otherwise.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Connection state label.
    pub connection: String,
    /// The session was revoked and needs fresh pairing.
    pub logged_out: bool,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Health check handler.
pub async fn health_handler(Extension(state): Extension<Arc<AppState>>) -> Json<HealthStatus> {
    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0);

    let connection = state.manager.state();
    let status = if state.manager.session().is_ready() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connection: connection.label().to_string(),
        logged_out: connection.is_logged_out(),
        uptime_seconds: uptime,
    })
}
