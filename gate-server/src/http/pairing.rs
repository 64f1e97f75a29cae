//! Pairing page: shows the current challenge for out-of-band confirmation.

use super::AppState;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;

const NO_CHALLENGE: &str = "No pairing challenge available; the session is linked or still connecting.";

/// JSON view of the current challenge.
#[derive(Debug, Clone, Serialize)]
pub struct PairingView {
    /// Raw challenge token.
    pub token: String,
    /// Base64url display payload for other renderers.
    pub payload: String,
    /// QR image of the token as a `data:` URI, when it fits.
    pub qr: Option<String>,
    /// Human-comparable short code.
    pub short_code: String,
    /// Unix timestamp of issuance.
    pub issued_at: u64,
}

/// `GET /pairing` (and `/qr`): HTML by default, JSON on request.
pub async fn pairing_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let json = wants_json(&headers);

    let Some(challenge) = state.manager.pairing().current() else {
        return if json {
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "status": "error", "message": NO_CHALLENGE })),
            )
                .into_response()
        } else {
            (StatusCode::NOT_FOUND, NO_CHALLENGE).into_response()
        };
    };

    if json {
        Json(PairingView {
            payload: challenge.to_display_payload(),
            qr: challenge.qr_data_uri(),
            short_code: challenge.short_code(),
            issued_at: challenge.issued_at,
            token: challenge.token,
        })
        .into_response()
    } else {
        Html(challenge.render_html()).into_response()
    }
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("application/json"))
        .unwrap_or(false)
}
