//! `POST /send-message`.

use super::AppState;
use crate::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::{Extension, Json};
use gate_types::{GatewayError, Jid, OutboundPayload};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body. `recipient` is accepted in place of `destination`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendRequest {
    /// Phone number (any formatting) or group JID.
    #[serde(default, alias = "recipient")]
    pub destination: Option<String>,
    /// Text to send.
    #[serde(default)]
    pub message: Option<String>,
}

/// Success body.
#[derive(Debug, Clone, Serialize)]
pub struct SendResponse {
    /// Always `"success"`.
    pub status: &'static str,
    /// Human-readable confirmation.
    pub message: String,
    /// Where the message went.
    pub jid: String,
    /// Transport-assigned message id.
    pub message_id: String,
}

/// Validate, resolve the destination, and send through the live session.
///
/// Validation runs before the connection check, so a malformed request is a
/// 400 even while disconnected.
pub async fn send_handler(
    Extension(state): Extension<Arc<AppState>>,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> Result<Json<SendResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::invalid(rejection.body_text()))?;

    let destination = request
        .destination
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::invalid("destination and message are required"))?;
    let message = request
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::invalid("destination and message are required"))?;

    let jid = Jid::from_destination(destination)?;
    let payload = OutboundPayload::text(message);

    let ack = tokio::time::timeout(state.send_timeout, state.manager.send(&jid, &payload))
        .await
        .map_err(|_| {
            GatewayError::TransportFailure(format!(
                "send timed out after {}s",
                state.send_timeout.as_secs()
            ))
        })??;

    tracing::info!("Message {} sent to {}", ack.message_id, jid);

    Ok(Json(SendResponse {
        status: "success",
        message: "Message sent successfully".to_string(),
        jid: jid.to_string(),
        message_id: ack.message_id,
    }))
}
