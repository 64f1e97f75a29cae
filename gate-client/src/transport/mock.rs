//! Mock transport for testing and local runs.
//!
//! Lets tests drive connection events by hand and captures sent messages for
//! verification. With an autopilot identity configured it also plays the
//! part of the primary device: it issues a challenge, "confirms" it after a
//! delay, reports credentials and opens the session.

use super::{Connection, Established, Transport, TransportError, TransportEvent, EVENT_CHANNEL_CAPACITY};
use async_trait::async_trait;
use gate_types::{Ack, Credentials, Jid, OutboundPayload};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// Mock transport for testing.
///
/// Clones share state, so a test can keep one clone while the lifecycle
/// manager owns another.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    next_connection_id: u64,
    active: Option<ActiveConnection>,
    identity: Option<Jid>,
    connect_count: usize,
    seeds: Vec<Credentials>,
    sent_messages: Vec<(Jid, OutboundPayload)>,
    next_message_id: u64,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
    send_delay: Option<Duration>,
    autopilot: Option<Autopilot>,
}

#[derive(Debug)]
struct ActiveConnection {
    id: u64,
    events: mpsc::Sender<TransportEvent>,
}

#[derive(Debug, Clone)]
struct Autopilot {
    me: Jid,
    pair_after: Duration,
}

fn lock(inner: &Mutex<MockTransportInner>) -> MutexGuard<'_, MockTransportInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// Create a new mock transport that only does what the test tells it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that pairs as `me` on its own, `pair_after` after
    /// issuing the challenge, and reopens registered sessions immediately.
    pub fn with_autopilot(me: Jid, pair_after: Duration) -> Self {
        let transport = Self::new();
        lock(&transport.inner).autopilot = Some(Autopilot { me, pair_after });
        transport
    }

    /// Push an event onto the current connection's stream.
    ///
    /// Returns false if there is no live connection or its stream is full.
    pub fn emit(&self, event: TransportEvent) -> bool {
        let inner = lock(&self.inner);
        match &inner.active {
            Some(active) => active.events.try_send(event).is_ok(),
            None => false,
        }
    }

    /// Report a close with the given code and end the current connection.
    pub fn close_with(&self, code: Option<u16>) -> bool {
        let emitted = self.emit(TransportEvent::Closed {
            code,
            message: "closed by mock".to_string(),
        });
        let mut inner = lock(&self.inner);
        inner.active = None;
        inner.identity = None;
        emitted
    }

    /// Set the identity the current connection reports.
    pub fn set_identity(&self, identity: Option<Jid>) {
        lock(&self.inner).identity = identity;
    }

    /// Get all messages that were sent, in order.
    pub fn sent_messages(&self) -> Vec<(Jid, OutboundPayload)> {
        lock(&self.inner).sent_messages.clone()
    }

    /// Get the last message that was sent.
    pub fn last_sent(&self) -> Option<(Jid, OutboundPayload)> {
        lock(&self.inner).sent_messages.last().cloned()
    }

    /// Number of connections opened (forced failures not counted).
    pub fn connect_count(&self) -> usize {
        lock(&self.inner).connect_count
    }

    /// Credentials the most recent connection was seeded with.
    pub fn last_seed(&self) -> Option<Credentials> {
        lock(&self.inner).seeds.last().cloned()
    }

    /// Check if a connection is live.
    pub fn is_connected(&self) -> bool {
        lock(&self.inner).active.is_some()
    }

    /// Cause the next connect() to fail with the given error.
    pub fn fail_next_connect(&self, error: &str) {
        lock(&self.inner).fail_next_connect = Some(error.to_string());
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        lock(&self.inner).fail_next_send = Some(error.to_string());
    }

    /// Make every send() wait `delay` before it is delivered.
    pub fn set_send_delay(&self, delay: Option<Duration>) {
        lock(&self.inner).send_delay = delay;
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, credentials: Credentials) -> Result<Established, TransportError> {
        let mut inner = lock(&self.inner);

        // Check for forced failure
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }

        inner.connect_count += 1;
        inner.next_connection_id += 1;
        let id = inner.next_connection_id;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let registered = credentials.is_registered();
        inner.identity = if registered {
            credentials.me.clone()
        } else {
            None
        };
        inner.seeds.push(credentials);

        if let Some(autopilot) = inner.autopilot.clone() {
            if registered {
                let _ = tx.try_send(TransportEvent::Opened);
            } else {
                spawn_pairing(Arc::clone(&self.inner), id, tx.clone(), autopilot);
            }
        }

        // Replacing the sender ends the previous connection's stream
        inner.active = Some(ActiveConnection { id, events: tx });

        Ok(Established {
            connection: Arc::new(MockConnection {
                id,
                inner: Arc::clone(&self.inner),
            }),
            events: rx,
        })
    }
}

fn spawn_pairing(
    inner: Arc<Mutex<MockTransportInner>>,
    id: u64,
    events: mpsc::Sender<TransportEvent>,
    autopilot: Autopilot,
) {
    tokio::spawn(async move {
        let token = format!("2@mock-{}", id);
        if events.send(TransportEvent::Challenge { token }).await.is_err() {
            return;
        }

        tokio::time::sleep(autopilot.pair_after).await;

        {
            let mut inner = lock(&inner);
            if inner.active.as_ref().map(|a| a.id) != Some(id) {
                return;
            }
            inner.identity = Some(autopilot.me.clone());
        }

        let material = format!("mock-key-{}", autopilot.me).into_bytes();
        let credentials = Credentials::new(Some(autopilot.me), material);
        if events
            .send(TransportEvent::CredentialsUpdated(credentials))
            .await
            .is_ok()
        {
            let _ = events.send(TransportEvent::Opened).await;
        }
    });
}

/// One mock connection; stale once the transport connects again.
#[derive(Debug)]
struct MockConnection {
    id: u64,
    inner: Arc<Mutex<MockTransportInner>>,
}

impl MockConnection {
    fn is_current(&self, inner: &MockTransportInner) -> bool {
        inner.active.as_ref().map(|a| a.id) == Some(self.id)
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&self, to: &Jid, payload: &OutboundPayload) -> Result<Ack, TransportError> {
        let delay = lock(&self.inner).send_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = lock(&self.inner);

        if !self.is_current(&inner) {
            return Err(TransportError::NotConnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }

        inner.next_message_id += 1;
        let message_id = format!("MOCK{:012X}", inner.next_message_id);
        inner.sent_messages.push((to.clone(), payload.clone()));

        Ok(Ack {
            message_id,
            to: to.clone(),
        })
    }

    fn identity(&self) -> Option<Jid> {
        let inner = lock(&self.inner);
        if self.is_current(&inner) {
            inner.identity.clone()
        } else {
            None
        }
    }

    async fn close(&self) {
        let mut inner = lock(&self.inner);
        if self.is_current(&inner) {
            inner.active = None;
            inner.identity = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn me() -> Jid {
        Jid::parse("15550001111@s.whatsapp.net").unwrap()
    }

    fn to() -> Jid {
        Jid::parse("15552223333@s.whatsapp.net").unwrap()
    }

    // ===========================================
    // MockTransport Basic Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_connects() {
        let transport = MockTransport::new();
        assert!(!transport.is_connected());

        transport.connect(Credentials::empty()).await.unwrap();

        assert!(transport.is_connected());
        assert_eq!(transport.connect_count(), 1);
        assert_eq!(transport.last_seed(), Some(Credentials::empty()));
    }

    #[tokio::test]
    async fn registered_seed_sets_identity() {
        let transport = MockTransport::new();
        let creds = Credentials::new(Some(me()), vec![1, 2, 3]);

        let established = transport.connect(creds).await.unwrap();

        assert_eq!(established.connection.identity(), Some(me()));
    }

    #[tokio::test]
    async fn mock_transport_sends_messages() {
        let transport = MockTransport::new();
        let established = transport.connect(Credentials::empty()).await.unwrap();

        let ack1 = established
            .connection
            .send(&to(), &OutboundPayload::text("one"))
            .await
            .unwrap();
        let ack2 = established
            .connection
            .send(&to(), &OutboundPayload::text("two"))
            .await
            .unwrap();

        assert_ne!(ack1.message_id, ack2.message_id);
        assert_eq!(ack1.to, to());
        let sent = transport.sent_messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].1, OutboundPayload::text("two"));
        assert_eq!(transport.last_sent().unwrap().1, OutboundPayload::text("two"));
    }

    #[tokio::test]
    async fn emitted_events_arrive_in_order() {
        let transport = MockTransport::new();
        let mut established = transport.connect(Credentials::empty()).await.unwrap();

        assert!(transport.emit(TransportEvent::Challenge {
            token: "t1".into()
        }));
        assert!(transport.emit(TransportEvent::Opened));

        assert_eq!(
            established.events.recv().await,
            Some(TransportEvent::Challenge { token: "t1".into() })
        );
        assert_eq!(established.events.recv().await, Some(TransportEvent::Opened));
    }

    #[tokio::test]
    async fn close_with_reports_code_then_ends_stream() {
        let transport = MockTransport::new();
        let mut established = transport.connect(Credentials::empty()).await.unwrap();

        transport.close_with(Some(401));

        assert!(matches!(
            established.events.recv().await,
            Some(TransportEvent::Closed { code: Some(401), .. })
        ));
        assert_eq!(established.events.recv().await, None);
        assert!(!transport.is_connected());
    }

    // ===========================================
    // Error Condition Tests
    // ===========================================

    #[tokio::test]
    async fn emit_without_connect_fails() {
        let transport = MockTransport::new();
        assert!(!transport.emit(TransportEvent::Opened));
    }

    #[tokio::test]
    async fn forced_connect_failure() {
        let transport = MockTransport::new();
        transport.fail_next_connect("network unreachable");

        let result = transport.connect(Credentials::empty()).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
        assert!(!transport.is_connected());

        // Next connect should work
        transport.connect(Credentials::empty()).await.unwrap();
    }

    #[tokio::test]
    async fn forced_send_failure() {
        let transport = MockTransport::new();
        let established = transport.connect(Credentials::empty()).await.unwrap();
        transport.fail_next_send("stream errored");

        let result = established
            .connection
            .send(&to(), &OutboundPayload::text("x"))
            .await;
        assert!(matches!(result, Err(TransportError::SendFailed(_))));

        // Next send should work
        established
            .connection
            .send(&to(), &OutboundPayload::text("x"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn replaced_connection_goes_stale() {
        let transport = MockTransport::new();
        let mut first = transport.connect(Credentials::empty()).await.unwrap();
        let _second = transport.connect(Credentials::empty()).await.unwrap();

        let result = first.connection.send(&to(), &OutboundPayload::text("x")).await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
        assert_eq!(first.events.recv().await, None);
    }

    #[tokio::test]
    async fn closed_connection_cannot_send() {
        let transport = MockTransport::new();
        let established = transport.connect(Credentials::empty()).await.unwrap();
        established.connection.close().await;
        established.connection.close().await;

        let result = established
            .connection
            .send(&to(), &OutboundPayload::text("x"))
            .await;
        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    // ===========================================
    // Autopilot Tests
    // ===========================================

    #[tokio::test]
    async fn autopilot_pairs_fresh_session() {
        let transport = MockTransport::with_autopilot(me(), Duration::from_millis(10));
        let mut established = transport.connect(Credentials::empty()).await.unwrap();

        assert!(matches!(
            established.events.recv().await,
            Some(TransportEvent::Challenge { .. })
        ));
        match established.events.recv().await {
            Some(TransportEvent::CredentialsUpdated(creds)) => {
                assert_eq!(creds.me, Some(me()));
                assert!(creds.is_registered());
            }
            other => panic!("expected credentials, got {:?}", other),
        }
        assert_eq!(established.events.recv().await, Some(TransportEvent::Opened));
        assert_eq!(established.connection.identity(), Some(me()));
    }

    #[tokio::test]
    async fn autopilot_reopens_registered_session() {
        let transport = MockTransport::with_autopilot(me(), Duration::from_secs(60));
        let creds = Credentials::new(Some(me()), vec![7; 16]);
        let mut established = transport.connect(creds).await.unwrap();

        assert_eq!(established.events.recv().await, Some(TransportEvent::Opened));
    }

    // ===========================================
    // Clone and Shared State Tests
    // ===========================================

    #[tokio::test]
    async fn mock_transport_clone_shares_state() {
        let transport1 = MockTransport::new();
        let transport2 = transport1.clone();

        transport1.connect(Credentials::empty()).await.unwrap();
        assert!(transport2.is_connected());
        assert_eq!(transport2.connect_count(), 1);
    }
}
