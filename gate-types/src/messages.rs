//! Message envelopes exchanged with the transport.
//!
//! Inbound events arrive in the transport's own shape ([`RawMessageEvent`],
//! camelCase JSON) and are reduced to an [`InboundMessage`] by the router.
//! Outbound traffic is limited to plain text.

use serde::{Deserialize, Serialize};

use crate::{AddressClass, Jid};

/// Addressing metadata of a raw message event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    /// Conversation the message belongs to (sender or group).
    #[serde(default)]
    pub remote_jid: Option<String>,
    /// True when this session sent the message itself.
    #[serde(default)]
    pub from_me: bool,
    /// Transport-assigned message id.
    #[serde(default)]
    pub id: String,
}

/// Extended text body (text with link previews, quotes, mentions).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtendedTextMessage {
    /// The visible text.
    #[serde(default)]
    pub text: Option<String>,
}

/// The content part of a raw message event.
///
/// Only the two text shapes are modelled; any other content type
/// deserializes to an empty value and is filtered out.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    /// Plain text body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
    /// Extended text body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_text_message: Option<ExtendedTextMessage>,
}

/// A message event as emitted by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessageEvent {
    /// Addressing metadata.
    pub key: MessageKey,
    /// Content, absent for protocol/system messages.
    #[serde(default)]
    pub message: Option<MessageContent>,
    /// Display name of the sender, if the network provided one.
    #[serde(default)]
    pub push_name: Option<String>,
}

impl RawMessageEvent {
    /// Build a plain-text event (used by transports and tests).
    pub fn text(remote_jid: &str, id: &str, from_me: bool, text: &str) -> Self {
        Self {
            key: MessageKey {
                remote_jid: Some(remote_jid.to_string()),
                from_me,
                id: id.to_string(),
            },
            message: Some(MessageContent {
                conversation: Some(text.to_string()),
                extended_text_message: None,
            }),
            push_name: None,
        }
    }
}

/// Unified body of an accepted inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "text", rename_all = "snake_case")]
pub enum MessageBody {
    /// Came from `conversation`.
    Plain(String),
    /// Came from `extendedTextMessage.text`.
    ExtendedText(String),
}

impl MessageBody {
    /// The text regardless of shape.
    pub fn text(&self) -> &str {
        match self {
            MessageBody::Plain(text) | MessageBody::ExtendedText(text) => text,
        }
    }
}

/// An inbound message that passed the router's filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Transport-assigned message id.
    pub id: String,
    /// Conversation the message came from.
    pub from: Jid,
    /// Always false for messages that reach the router output.
    pub from_me: bool,
    /// Sender display name, if any.
    pub push_name: Option<String>,
    /// The text body.
    pub body: MessageBody,
    /// User or group, derived from `from`.
    pub class: AddressClass,
}

/// Payload handed to the transport for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundPayload {
    /// A plain text message.
    Text {
        /// Message text.
        text: String,
    },
}

impl OutboundPayload {
    /// Convenience constructor for a text payload.
    pub fn text(text: impl Into<String>) -> Self {
        OutboundPayload::Text { text: text.into() }
    }
}

/// Transport acknowledgement of an accepted send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Message id assigned by the transport.
    pub message_id: String,
    /// Where the message went.
    pub to: Jid,
}
