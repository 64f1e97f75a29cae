//! Error types for linkgate-server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gate_client::ManagerError;
use gate_types::GatewayError;
use serde::Serialize;

/// Main error type for running the gateway.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// The HTTP listener could not bind.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that was requested.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The lifecycle manager stopped with an error.
    #[error("lifecycle manager error: {0}")]
    Manager(#[from] ManagerError),

    /// The lifecycle manager task panicked or was cancelled.
    #[error("lifecycle manager task failed: {0}")]
    Task(String),

    /// The lifecycle manager stopped while the API was still serving.
    #[error("lifecycle manager stopped unexpectedly")]
    ManagerStopped,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// JSON error body: `{"status": "error", "message": ..., "code": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Always `"error"`.
    pub status: &'static str,
    /// Human-readable description.
    pub message: String,
    /// Stable machine-readable code.
    pub code: &'static str,
}

/// A [`GatewayError`] on its way out of an HTTP handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError(pub GatewayError);

impl ApiError {
    /// Shorthand for a 400.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self(GatewayError::InvalidRequest(reason.into()))
    }

    /// HTTP status for the wrapped error.
    pub fn status(&self) -> StatusCode {
        match self.0 {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotConnected | GatewayError::LoggedOut => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::TransportFailure(_) | GatewayError::PersistenceFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }

        let body = ErrorBody {
            status: "error",
            message: self.0.to_string(),
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}
