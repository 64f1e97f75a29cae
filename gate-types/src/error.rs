//! Caller-visible error taxonomy.

use thiserror::Error;

/// Errors surfaced to API callers.
///
/// Internal layers keep their own error types and convert into this one at
/// the API boundary. Non-logout disconnects never show up here; they are
/// handled by reconnecting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// A send was attempted without a ready session.
    #[error("messaging session is not connected")]
    NotConnected,

    /// The request is missing required fields or is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The transport rejected or timed out the operation.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// The session was revoked and needs fresh pairing.
    #[error("session logged out; pairing required")]
    LoggedOut,

    /// Credentials could not be written durably.
    #[error("credential persistence failed: {0}")]
    PersistenceFailure(String),
}

impl GatewayError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::NotConnected => "not_connected",
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::TransportFailure(_) => "transport_failure",
            GatewayError::LoggedOut => "logged_out",
            GatewayError::PersistenceFailure(_) => "persistence_failure",
        }
    }
}
