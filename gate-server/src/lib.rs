//! # gate-server
//!
//! HTTP gateway around one authenticated messaging session.
//!
//! This crate wires the pieces together:
//! - Loads configuration (TOML file plus `PORT` / `PERSISTENT_DATA_PATH`)
//! - Runs the lifecycle manager against a transport and file-backed credentials
//! - Serves the pairing page and the send endpoint
//!
//! ## Architecture
//!
//! ```text
//!  HTTP client ──► axum router ──► ManagerHandle ──► SessionReader ──► Connection
//!                      │                                                  ▲
//!                      └─► PairingChannel ◄── LifecycleManager ───────────┘
//!                                                  │
//!                                        FileCredentialStore (auth_info/)
//! ```
//!
//! ## Endpoints
//!
//! - `GET /pairing` (alias `/qr`): current pairing challenge, 404 when none
//! - `POST /send-message`: `{destination, message}` → send through the session
//! - `GET /health`: connection state and uptime

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;

pub use config::{Config, ConfigError};
pub use error::{ApiError, ServerError};
pub use gateway::Gateway;
