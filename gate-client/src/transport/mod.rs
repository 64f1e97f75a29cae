//! Transport abstraction for linkgate.
//!
//! This module provides a pluggable transport layer that abstracts the
//! messaging network's socket protocol (mock for testing and local runs).
//!
//! # Design
//!
//! The transport is connection-oriented and event-driven:
//! - `Transport::connect()` opens one connection seeded with stored credentials
//! - the returned [`Connection`] sends outbound messages and reports identity
//! - lifecycle, credential and message events arrive on a per-connection
//!   `mpsc` receiver, consumed only by the lifecycle manager
//!
//! Dropping the receiver abandons the connection's events; a replaced
//! connection can never feed the manager stale events.
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! let established = transport.connect(Credentials::empty()).await?;
//! while let Some(event) = established.events.recv().await { ... }
//! ```

mod mock;

pub use mock::MockTransport;

use async_trait::async_trait;
use gate_types::{Ack, Credentials, Jid, OutboundPayload, RawMessageEvent};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Capacity of the per-connection event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,
}

/// Events a live connection reports to the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A new pairing challenge must be confirmed out-of-band.
    Challenge {
        /// The challenge token.
        token: String,
    },
    /// The credential set changed and must be persisted.
    CredentialsUpdated(Credentials),
    /// The session is open and authenticated.
    Opened,
    /// The connection closed.
    Closed {
        /// Integer close code, if the transport supplied one.
        code: Option<u16>,
        /// Human-readable detail for logs.
        message: String,
    },
    /// A batch of inbound message events.
    Messages(Vec<RawMessageEvent>),
}

/// A freshly opened connection plus its event stream.
pub struct Established {
    /// Handle used for sending while the session is bound.
    pub connection: Arc<dyn Connection>,
    /// Lifecycle and message events, in transport order.
    pub events: mpsc::Receiver<TransportEvent>,
}

impl fmt::Debug for Established {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Established")
            .field("identity", &self.connection.identity())
            .finish_non_exhaustive()
    }
}

/// Transport trait for opening connections to the messaging network.
///
/// Implementations own the socket protocol (handshake, encryption,
/// keep-alives); linkgate only sees the resulting events.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection seeded with the given credentials.
    ///
    /// Empty credentials start a fresh pairing flow.
    async fn connect(&self, credentials: Credentials) -> Result<Established, TransportError>;
}

/// One live connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Deliver a payload to `to`.
    async fn send(&self, to: &Jid, payload: &OutboundPayload) -> Result<Ack, TransportError>;

    /// The authenticated identity, once the session is registered.
    fn identity(&self) -> Option<Jid>;

    /// Close the connection. Idempotent.
    async fn close(&self);
}
