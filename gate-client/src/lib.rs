//! # gate-client
//!
//! The I/O side of linkgate: keeps one authenticated messaging session alive.
//!
//! ## Features
//!
//! - **Lifecycle Management**: Reconnects on every non-logout close
//! - **Durable Credentials**: Atomic, fsynced writes before the next event
//! - **Transport Abstraction**: Pluggable transport layer (mock included)
//! - **Pure State Machine**: Uses gate-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use gate_client::{FileCredentialStore, LifecycleManager, MockTransport};
//!
//! let manager = LifecycleManager::new(MockTransport::new(), FileCredentialStore::new("auth_info"));
//! let (handle, task) = manager.spawn();
//!
//! if let Some(challenge) = handle.pairing().current() {
//!     println!("{}", challenge.short_code());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod pairing;
pub mod router;
pub mod session;
pub mod store;
pub mod transport;

pub use manager::{LifecycleManager, ManagerError, ManagerEvent, ManagerHandle};
pub use pairing::PairingChannel;
pub use router::MessageRouter;
pub use session::{SendError, SessionHandle, SessionReader};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreError};
pub use transport::{
    Connection, Established, MockTransport, Transport, TransportError, TransportEvent,
};
