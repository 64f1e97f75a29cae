//! Inbound message filtering and classification.
//!
//! Pure functions: the router in gate-client calls these and does the
//! logging and forwarding.

use gate_types::{AddressClass, InboundMessage, Jid, MessageBody, RawMessageEvent};

/// Which raw events get through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundFilter {
    /// Drop broadcast lists and status updates.
    pub ignore_broadcast: bool,
}

impl Default for InboundFilter {
    fn default() -> Self {
        Self {
            ignore_broadcast: true,
        }
    }
}

impl InboundFilter {
    /// Reduce a raw event to an [`InboundMessage`], or filter it out.
    ///
    /// Returns `None` for self-originated events, events without a sender,
    /// events whose content is neither plain nor extended text, events with
    /// an empty body, and (when configured) broadcast traffic.
    pub fn accept(&self, raw: &RawMessageEvent) -> Option<InboundMessage> {
        if raw.key.from_me {
            return None;
        }

        let from = raw.key.remote_jid.as_deref().and_then(Jid::parse)?;
        if self.ignore_broadcast && from.is_broadcast() {
            return None;
        }

        let body = extract_body(raw)?;
        let class = from.class();

        Some(InboundMessage {
            id: raw.key.id.clone(),
            from,
            from_me: false,
            push_name: raw.push_name.clone(),
            body,
            class,
        })
    }
}

/// [`InboundFilter::accept`] with the default filter.
pub fn accept(raw: &RawMessageEvent) -> Option<InboundMessage> {
    InboundFilter::default().accept(raw)
}

/// User or group, by the sender's JID suffix.
pub fn classify(message: &InboundMessage) -> AddressClass {
    message.from.class()
}

/// Plain text wins over extended text when both are present.
fn extract_body(raw: &RawMessageEvent) -> Option<MessageBody> {
    let content = raw.message.as_ref()?;

    if let Some(text) = content.conversation.as_deref().filter(|t| !t.is_empty()) {
        return Some(MessageBody::Plain(text.to_string()));
    }

    content
        .extended_text_message
        .as_ref()
        .and_then(|ext| ext.text.as_deref())
        .filter(|t| !t.is_empty())
        .map(|text| MessageBody::ExtendedText(text.to_string()))
}
