//! Swappable reference to the live connection.
//!
//! The lifecycle manager owns the [`SessionHandle`] (the only writer); API
//! callers hold [`SessionReader`]s and re-fetch the connection on every
//! call, so they always see whichever connection is bound right now.

use crate::transport::{Connection, TransportError};
use gate_types::{Ack, GatewayError, Jid, OutboundPayload};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Longest transport detail kept in caller-visible errors.
const MAX_ERROR_DETAIL: usize = 120;

/// Send errors.
#[derive(Debug, Error)]
pub enum SendError {
    /// No connection is bound.
    #[error("not connected")]
    NotConnected,

    /// The bound connection rejected or failed the send.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<SendError> for GatewayError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::NotConnected | SendError::Transport(TransportError::NotConnected) => {
                GatewayError::NotConnected
            }
            SendError::Transport(e) => GatewayError::TransportFailure(truncate(&e.to_string())),
        }
    }
}

fn truncate(detail: &str) -> String {
    match detail.char_indices().nth(MAX_ERROR_DETAIL) {
        Some((idx, _)) => format!("{}...", &detail[..idx]),
        None => detail.to_string(),
    }
}

type Slot = Arc<RwLock<Option<Arc<dyn Connection>>>>;

fn snapshot(slot: &Slot) -> Option<Arc<dyn Connection>> {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Writer side: bind and unbind the live connection.
pub struct SessionHandle {
    slot: Slot,
}

impl SessionHandle {
    /// Create an unbound handle.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// Bind `connection`, replacing any previous one.
    ///
    /// The previous connection is not closed here; the transport owns that.
    pub fn bind(&self, connection: Arc<dyn Connection>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(connection);
    }

    /// Clear the binding. Idempotent.
    pub fn unbind(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Check if a connection is bound.
    pub fn is_bound(&self) -> bool {
        snapshot(&self.slot).is_some()
    }

    /// A read-only view for API callers.
    pub fn reader(&self) -> SessionReader {
        SessionReader {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Reader side: send through and inspect whatever is bound.
#[derive(Clone)]
pub struct SessionReader {
    slot: Slot,
}

impl SessionReader {
    /// Send through the bound connection.
    ///
    /// The binding is snapshotted first; no lock is held while the send is
    /// in flight.
    pub async fn try_send(&self, to: &Jid, payload: &OutboundPayload) -> Result<Ack, SendError> {
        let connection = snapshot(&self.slot).ok_or(SendError::NotConnected)?;
        Ok(connection.send(to, payload).await?)
    }

    /// A connection is bound and reports an authenticated identity.
    pub fn is_ready(&self) -> bool {
        self.identity().is_some()
    }

    /// Identity of the bound connection, if ready.
    pub fn identity(&self) -> Option<Jid> {
        snapshot(&self.slot).and_then(|connection| connection.identity())
    }
}

impl fmt::Debug for SessionReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionReader")
            .field("ready", &self.is_ready())
            .finish()
    }
}
