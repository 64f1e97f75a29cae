//! Inbound message dispatch.
//!
//! Filtering is pure (`gate_core::inbound`); this module logs what got
//! through and forwards it to an optional output stream without ever
//! blocking the lifecycle manager's event loop.

use gate_core::InboundFilter;
use gate_types::{InboundMessage, RawMessageEvent};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Logs and forwards accepted inbound messages.
#[derive(Debug, Clone, Default)]
pub struct MessageRouter {
    filter: InboundFilter,
    output: Option<mpsc::Sender<InboundMessage>>,
}

impl MessageRouter {
    /// Create a router that only logs.
    pub fn new(filter: InboundFilter) -> Self {
        Self {
            filter,
            output: None,
        }
    }

    /// Also forward accepted messages to `output`.
    pub fn with_output(mut self, output: mpsc::Sender<InboundMessage>) -> Self {
        self.output = Some(output);
        self
    }

    /// Route one batch of raw events. Returns how many were accepted.
    pub fn route(&self, batch: Vec<RawMessageEvent>) -> usize {
        let mut accepted = 0;

        for raw in &batch {
            let Some(message) = self.filter.accept(raw) else {
                tracing::trace!(id = %raw.key.id, "inbound event filtered");
                continue;
            };
            accepted += 1;

            tracing::info!(
                message_type = %message.class,
                from = %message.from,
                push_name = message.push_name.as_deref().unwrap_or(""),
                "new message"
            );
            tracing::debug!(id = %message.id, text = message.body.text(), "message body");

            self.forward(message);
        }

        accepted
    }

    fn forward(&self, message: InboundMessage) {
        let Some(output) = &self.output else {
            return;
        };
        match output.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                tracing::warn!(id = %message.id, "inbound output full, message dropped");
            }
            Err(TrySendError::Closed(message)) => {
                tracing::warn!(id = %message.id, "inbound output closed, message dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_types::AddressClass;

    fn user_text(text: &str) -> RawMessageEvent {
        RawMessageEvent::text("15551234567@s.whatsapp.net", "U1", false, text)
    }

    #[tokio::test]
    async fn accepted_messages_are_forwarded_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let router = MessageRouter::default().with_output(tx);

        let accepted = router.route(vec![
            user_text("one"),
            RawMessageEvent::text("120363000000000000@g.us", "G1", false, "two"),
        ]);

        assert_eq!(accepted, 2);
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.body.text(), "one");
        assert_eq!(first.class, AddressClass::User);
        assert_eq!(second.class, AddressClass::Group);
    }

    #[tokio::test]
    async fn self_originated_never_reach_output() {
        let (tx, mut rx) = mpsc::channel(8);
        let router = MessageRouter::default().with_output(tx);

        let accepted = router.route(vec![RawMessageEvent::text(
            "15551234567@s.whatsapp.net",
            "M1",
            true,
            "mine",
        )]);

        assert_eq!(accepted, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_is_dropped_by_default() {
        let (tx, mut rx) = mpsc::channel(8);
        let router = MessageRouter::default().with_output(tx);

        router.route(vec![RawMessageEvent::text(
            "status@broadcast",
            "S1",
            false,
            "story",
        )]);

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_output_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let router = MessageRouter::default().with_output(tx);

        let accepted = router.route(vec![user_text("one"), user_text("two")]);

        assert_eq!(accepted, 2);
        assert_eq!(rx.recv().await.unwrap().body.text(), "one");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_output_is_tolerated() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let router = MessageRouter::default().with_output(tx);

        assert_eq!(router.route(vec![user_text("one")]), 1);
    }

    #[test]
    fn router_without_output_only_counts() {
        let router = MessageRouter::new(InboundFilter::default());
        assert_eq!(router.route(vec![user_text("one")]), 1);
    }
}
