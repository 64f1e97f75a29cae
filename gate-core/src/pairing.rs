//! Pairing challenges for linking a new session.
//!
//! This module provides:
//! - The [`PairingChallenge`] value issued by the transport while unpaired
//! - A QR image of the token for scanning from the primary device
//! - A display payload (base64 JSON) for other renderers
//! - A short code (XXXX-XXXX-XXXX-XXXX) for reading the challenge aloud
//! - An HTML rendering for the out-of-band pairing page
//!
//! The pairing flow:
//! 1. The transport connects without valid credentials and issues a token
//! 2. The token is displayed out-of-band (pairing page)
//! 3. The user confirms it from the primary device
//! 4. The transport reports new credentials and opens the session

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use qrcode::{render::svg, QrCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default challenge TTL (60 seconds); the transport rotates tokens faster.
pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(60);

/// Minimum edge length of the rendered QR image, in pixels.
const QR_MIN_SIZE: u32 = 264;

/// A pairing challenge awaiting out-of-band confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingChallenge {
    /// The token the primary device must confirm.
    pub token: String,
    /// Unix timestamp when the challenge was issued.
    pub issued_at: u64,
    /// Seconds after `issued_at` when the challenge stops being useful.
    pub ttl_secs: u64,
}

/// Display payload shape, kept separate so the serialized form is stable.
#[derive(Serialize)]
struct DisplayPayload<'a> {
    token: &'a str,
    issued_at: u64,
}

impl PairingChallenge {
    /// Create a challenge issued now with the default TTL.
    pub fn new(token: impl Into<String>) -> Self {
        Self::issued_at(token, unix_now(), DEFAULT_CHALLENGE_TTL)
    }

    /// Create a challenge issued now with a custom TTL.
    pub fn with_ttl(token: impl Into<String>, ttl: Duration) -> Self {
        Self::issued_at(token, unix_now(), ttl)
    }

    /// Create a challenge with an explicit issuance time and TTL.
    pub fn issued_at(token: impl Into<String>, issued_at: u64, ttl: Duration) -> Self {
        Self {
            token: token.into(),
            issued_at,
            ttl_secs: ttl.as_secs(),
        }
    }

    /// Check if the challenge has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        unix_now() >= self.issued_at.saturating_add(self.ttl_secs)
    }

    /// Still worth showing.
    pub fn is_usable(&self) -> bool {
        !self.is_expired()
    }

    /// The token as a scannable QR code: an SVG image in a `data:` URI.
    ///
    /// `None` if the token is too long to fit in a QR code.
    pub fn qr_data_uri(&self) -> Option<String> {
        let code = QrCode::new(self.token.as_bytes()).ok()?;
        let image = code
            .render::<svg::Color>()
            .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
            .build();
        Some(format!("data:image/svg+xml;base64,{}", STANDARD.encode(image)))
    }

    /// Encode the challenge as a base64 JSON payload for external renderers.
    ///
    /// Format: `BASE64URL(JSON({ token, issued_at }))`
    pub fn to_display_payload(&self) -> String {
        let payload = DisplayPayload {
            token: &self.token,
            issued_at: self.issued_at,
        };
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Short code derived from the token (XXXX-XXXX-XXXX-XXXX).
    ///
    /// First 10 bytes of SHA-256(token), base32 encoded: 80 bits, enough to
    /// cross-check that both screens show the same challenge.
    pub fn short_code(&self) -> String {
        let digest = Sha256::digest(self.token.as_bytes());
        let encoded = base32_encode(&digest[..10]);

        format!(
            "{}-{}-{}-{}",
            &encoded[0..4],
            &encoded[4..8],
            &encoded[8..12],
            &encoded[12..16]
        )
    }

    /// Render a self-contained HTML page for the pairing endpoint.
    pub fn render_html(&self) -> String {
        let qr = self
            .qr_data_uri()
            .map(|uri| {
                format!(
                    r#"<img id="pairing-qr" alt="Pairing QR code" width="{size}" height="{size}" src="{uri}">"#,
                    size = QR_MIN_SIZE,
                )
            })
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Link device</title></head>
<body style="display:flex;justify-content:center;align-items:center;height:100vh;margin:0;background:#f0f2f5;font-family:sans-serif;">
<div style="text-align:center;padding:40px;background:white;border-radius:12px;box-shadow:0 4px 12px rgba(0,0,0,0.1);max-width:640px;">
<h1>Link this gateway</h1>
<p>Open the app on your phone, go to Linked Devices and scan the code below.</p>
{qr}
<p style="font-size:28px;letter-spacing:2px;"><strong>{short_code}</strong></p>
<pre id="pairing-token" style="white-space:pre-wrap;word-break:break-all;background:#f6f6f6;padding:12px;">{token}</pre>
<p><small>Display payload: <code id="pairing-payload" style="word-break:break-all;">{payload}</code></small></p>
</div>
</body>
</html>
"#,
            short_code = self.short_code(),
            token = escape_html(&self.token),
            payload = self.to_display_payload(),
        )
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Encode bytes as base32 (RFC 4648, uppercase, no padding).
fn base32_encode(bytes: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
    let mut result = String::new();
    let mut bits = 0u32;
    let mut bit_count = 0;

    for &byte in bytes {
        bits = (bits << 8) | (byte as u32);
        bit_count += 8;

        while bit_count >= 5 {
            bit_count -= 5;
            let index = ((bits >> bit_count) & 0x1F) as usize;
            result.push(ALPHABET[index] as char);
        }
    }

    if bit_count > 0 {
        let index = ((bits << (5 - bit_count)) & 0x1F) as usize;
        result.push(ALPHABET[index] as char);
    }

    result
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_challenge_is_usable() {
        let challenge = PairingChallenge::new("2@abc,def,ghi");
        assert!(challenge.is_usable());
        assert_eq!(challenge.ttl_secs, 60);
    }

    #[test]
    fn old_challenge_expires() {
        let challenge = PairingChallenge::issued_at("token", 0, Duration::from_secs(60));
        assert!(challenge.is_expired());
        assert!(!challenge.is_usable());
    }

    #[test]
    fn short_code_format() {
        let code = PairingChallenge::new("token").short_code();

        assert_eq!(code.len(), 19);
        assert_eq!(code.chars().filter(|c| *c == '-').count(), 3);
        assert!(code
            .chars()
            .filter(|c| *c != '-')
            .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c)));
    }

    #[test]
    fn short_code_is_deterministic() {
        let a = PairingChallenge::issued_at("same", 1, DEFAULT_CHALLENGE_TTL);
        let b = PairingChallenge::issued_at("same", 2, DEFAULT_CHALLENGE_TTL);
        let c = PairingChallenge::issued_at("other", 1, DEFAULT_CHALLENGE_TTL);
        assert_eq!(a.short_code(), b.short_code());
        assert_ne!(a.short_code(), c.short_code());
    }

    #[test]
    fn display_payload_decodes_to_token() {
        let challenge = PairingChallenge::issued_at("2@xyz", 1700000000, DEFAULT_CHALLENGE_TTL);
        let bytes = URL_SAFE_NO_PAD
            .decode(challenge.to_display_payload())
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["token"], "2@xyz");
        assert_eq!(json["issued_at"], 1700000000);
    }

    #[test]
    fn qr_image_is_svg_data_uri() {
        let challenge = PairingChallenge::new("2@abc,def,ghi");
        let uri = challenge.qr_data_uri().unwrap();

        let encoded = uri.strip_prefix("data:image/svg+xml;base64,").unwrap();
        let svg = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn oversized_token_has_no_qr_but_still_renders() {
        let challenge = PairingChallenge::new("x".repeat(8000));
        assert!(challenge.qr_data_uri().is_none());

        let html = challenge.render_html();
        assert!(!html.contains("pairing-qr"));
        assert!(html.contains(&challenge.short_code()));
    }

    #[test]
    fn html_embeds_qr_image_and_text_fallback() {
        let challenge = PairingChallenge::new("2@abc,def,ghi");
        let html = challenge.render_html();

        assert!(html.contains(r#"<img id="pairing-qr""#));
        assert!(html.contains("data:image/svg+xml;base64,"));
        assert!(html.contains(&challenge.short_code()));
        assert!(html.contains("2@abc,def,ghi"));
    }

    #[test]
    fn html_escapes_token() {
        let html = PairingChallenge::new("<script>alert(1)</script>").render_html();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn base32_known_vector() {
        // RFC 4648 test vector
        assert_eq!(base32_encode(b"foobar"), "MZXW6YTBOI");
    }
}
