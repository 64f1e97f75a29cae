//! # gate-core
//!
//! Pure logic for linkgate (no I/O, instant tests).
//!
//! This crate implements the session lifecycle state machine, reconnect
//! policies, pairing challenges, and inbound message filtering without any
//! network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (transport, credential files) is performed by
//! `gate-client`, which interprets the actions produced by the state machine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod inbound;
pub mod pairing;
pub mod policy;
pub mod state;

pub use inbound::{accept, classify, InboundFilter};
pub use pairing::{PairingChallenge, DEFAULT_CHALLENGE_TTL};
pub use policy::{ExponentialBackoff, Immediate, ReconnectPolicy};
pub use state::{Action, ConnectionState, Event, LifecycleEvent};
