//! HTTP endpoints for linkgate.
//!
//! Provides the pairing page, the send endpoint and a health check.

pub mod health;
pub mod pairing;
pub mod send;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use gate_client::ManagerHandle;
use std::sync::Arc;
use std::time::Duration;

pub use health::HealthStatus;
pub use pairing::PairingView;
pub use send::{SendRequest, SendResponse};

/// Shared state for all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// View of the running lifecycle manager.
    pub manager: ManagerHandle,
    /// Upper bound on a single send.
    pub send_timeout: Duration,
}

/// Build the HTTP router with all endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/pairing", get(pairing::pairing_handler))
        .route("/qr", get(pairing::pairing_handler))
        .route("/send-message", post(send::send_handler))
        .route("/health", get(health::health_handler))
        .layer(Extension(state))
}
