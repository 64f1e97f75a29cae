//! # gate-types
//!
//! Data types shared by all linkgate crates:
//! - [`Jid`], [`AddressClass`] - Addressing on the messaging network
//! - [`Credentials`] - Durable session identity
//! - [`DisconnectReason`] - Close-code classification
//! - [`RawMessageEvent`], [`InboundMessage`], [`OutboundPayload`] - Message envelopes
//! - [`GatewayError`] - Caller-visible error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

mod credentials;
mod error;
mod jid;
mod messages;
mod reason;

pub use credentials::Credentials;
pub use error::GatewayError;
pub use jid::{AddressClass, Jid, BROADCAST_SUFFIX, GROUP_SUFFIX, USER_SUFFIX};
pub use messages::{
    Ack, ExtendedTextMessage, InboundMessage, MessageBody, MessageContent, MessageKey,
    OutboundPayload, RawMessageEvent,
};
pub use reason::{DisconnectReason, CODE_LOGGED_OUT, RESTARTABLE_CODES};
