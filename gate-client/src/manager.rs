//! LifecycleManager - owns the single messaging session.
//!
//! # Architecture
//!
//! The manager drives the pure state machine from gate-core and interprets
//! its actions to perform the actual I/O:
//!
//! ```text
//! Transport events ─┐
//! Reconnect timer ──┼─> LifecycleManager ─> CredentialStore (persist)
//! Control (handle) ─┘        │              PairingChannel (show/clear)
//!                            │              SessionHandle (bind/unbind)
//!                            ↓              MessageRouter (inbound)
//!                   gate-core (pure state machine)
//! ```
//!
//! One task owns everything. Transport events for the live connection are
//! handled strictly in order, and events the state machine generates
//! internally (retries, persistence failures) are queued and drained before
//! the next transport event is read. A credential update is therefore
//! durable before any later event is processed.
//!
//! # Example
//!
//! ```ignore
//! let manager = LifecycleManager::new(transport, FileCredentialStore::new("auth_info"));
//! let (handle, task) = manager.spawn();
//!
//! handle.send(&jid, &OutboundPayload::text("hello")).await?;
//! handle.shutdown().await;
//! task.await??;
//! ```

use crate::pairing::PairingChannel;
use crate::router::MessageRouter;
use crate::session::{SessionHandle, SessionReader};
use crate::store::{CredentialStore, StoreError};
use crate::transport::{Connection, Transport, TransportEvent};
use gate_core::{
    Action, ConnectionState, Event, Immediate, LifecycleEvent, ReconnectPolicy,
    DEFAULT_CHALLENGE_TTL,
};
use gate_types::{Ack, DisconnectReason, GatewayError, Jid, OutboundPayload};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Capacity of the lifecycle event broadcast.
const EVENT_BROADCAST_CAPACITY: usize = 64;

/// Capacity of the control channel.
const CONTROL_CAPACITY: usize = 8;

/// Manager errors.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The credential store could not be read at startup.
    #[error("credential store unreadable: {0}")]
    Store(#[from] StoreError),
}

/// Published to [`ManagerHandle::subscribe`] observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    /// The connection state changed.
    StateChanged(ConnectionState),
    /// A lifecycle event from the state machine.
    Lifecycle(LifecycleEvent),
}

#[derive(Debug, Clone, Copy)]
enum Control {
    Restart,
    Relink,
    Shutdown,
}

enum Wake {
    Control(Option<Control>),
    Transport(Option<TransportEvent>),
    Reconnect,
}

/// Owns the session lifecycle. Consumed by [`LifecycleManager::run`].
pub struct LifecycleManager {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    policy: Arc<dyn ReconnectPolicy>,
    router: MessageRouter,
    pairing: Arc<PairingChannel>,
    session: SessionHandle,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<ManagerEvent>,
    control_tx: mpsc::Sender<Control>,
    control_rx: mpsc::Receiver<Control>,
    connection: Option<Arc<dyn Connection>>,
    transport_events: Option<mpsc::Receiver<TransportEvent>>,
    pending: VecDeque<Event>,
    reconnect_at: Option<Instant>,
    revision: u64,
}

impl LifecycleManager {
    /// Create a manager with the immediate reconnect policy, a log-only
    /// router and the default challenge TTL.
    pub fn new<T, S>(transport: T, store: S) -> Self
    where
        T: Transport + 'static,
        S: CredentialStore + 'static,
    {
        let (state_tx, _) = watch::channel(ConnectionState::new());
        let (events_tx, _) = broadcast::channel(EVENT_BROADCAST_CAPACITY);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);

        Self {
            transport: Arc::new(transport),
            store: Arc::new(store),
            policy: Arc::new(Immediate),
            router: MessageRouter::default(),
            pairing: Arc::new(PairingChannel::new(DEFAULT_CHALLENGE_TTL)),
            session: SessionHandle::new(),
            state: ConnectionState::new(),
            state_tx,
            events_tx,
            control_tx,
            control_rx,
            connection: None,
            transport_events: None,
            pending: VecDeque::new(),
            reconnect_at: None,
            revision: 0,
        }
    }

    /// Use a different reconnect policy.
    pub fn with_policy(mut self, policy: impl ReconnectPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Use a different message router.
    pub fn with_router(mut self, router: MessageRouter) -> Self {
        self.router = router;
        self
    }

    /// Set how long pairing challenges stay visible.
    ///
    /// Call before [`handle`](Self::handle); handles share the channel
    /// that exists when they are created.
    pub fn with_challenge_ttl(mut self, ttl: Duration) -> Self {
        self.pairing = Arc::new(PairingChannel::new(ttl));
        self
    }

    /// A cloneable handle for API callers.
    pub fn handle(&self) -> ManagerHandle {
        ManagerHandle {
            session: self.session.reader(),
            pairing: Arc::clone(&self.pairing),
            state: self.state_tx.subscribe(),
            events: self.events_tx.clone(),
            control: self.control_tx.clone(),
        }
    }

    /// Run on a new task.
    pub fn spawn(self) -> (ManagerHandle, JoinHandle<Result<(), ManagerError>>) {
        let handle = self.handle();
        (handle, tokio::spawn(self.run()))
    }

    /// Run until shutdown is requested through a [`ManagerHandle`].
    ///
    /// Fails only if the credential store is unreadable at startup; later
    /// failures are retried through the reconnect policy.
    pub async fn run(mut self) -> Result<(), ManagerError> {
        let seed = self.store.load().await?;
        self.revision = seed.revision;
        tracing::info!(
            "Lifecycle manager started (registered: {}, revision: {})",
            seed.is_registered(),
            seed.revision
        );
        drop(seed);

        self.pending.push_back(Event::StartRequested);

        loop {
            while let Some(event) = self.pending.pop_front() {
                let shutdown = matches!(event, Event::ShutdownRequested);
                self.apply(event).await;
                if shutdown {
                    tracing::info!("Lifecycle manager stopped");
                    return Ok(());
                }
            }

            let wake = tokio::select! {
                control = self.control_rx.recv() => Wake::Control(control),
                event = next_transport_event(&mut self.transport_events) => Wake::Transport(event),
                _ = reconnect_timer(self.reconnect_at) => Wake::Reconnect,
            };

            match wake {
                Wake::Control(Some(Control::Restart)) => {
                    self.pending.push_back(Event::StartRequested)
                }
                Wake::Control(Some(Control::Relink)) => self.relink().await,
                Wake::Control(Some(Control::Shutdown)) | Wake::Control(None) => {
                    self.pending.push_back(Event::ShutdownRequested)
                }
                Wake::Transport(Some(event)) => self.on_transport_event(event),
                Wake::Transport(None) => self.on_stream_end(),
                Wake::Reconnect => {
                    self.reconnect_at = None;
                    self.pending.push_back(Event::StartRequested);
                }
            }
        }
    }

    /// Erase stored credentials and start a fresh pairing attempt.
    /// Only honored once the session has been logged out.
    async fn relink(&mut self) {
        if !self.state.is_logged_out() {
            tracing::warn!("Relink ignored while {}", self.state.label());
            return;
        }
        match self.store.reset().await {
            Ok(()) => {
                tracing::info!("Stored credentials erased; starting a fresh pairing");
                self.revision = 0;
                self.pending.push_back(Event::StartRequested);
            }
            Err(e) => tracing::error!("Failed to erase stored credentials: {}", e),
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Challenge { token } => {
                self.pending.push_back(Event::ChallengeIssued { token })
            }
            TransportEvent::CredentialsUpdated(credentials) => {
                self.pending
                    .push_back(Event::CredentialsUpdated { credentials })
            }
            TransportEvent::Opened => self.pending.push_back(Event::Opened),
            TransportEvent::Closed { code, message } => {
                tracing::debug!("Transport closed (code: {:?}): {}", code, message);
                self.drop_connection();
                self.pending.push_back(Event::Closed {
                    reason: DisconnectReason::from_code(code),
                });
            }
            TransportEvent::Messages(batch) => {
                let total = batch.len();
                let accepted = self.router.route(batch);
                tracing::debug!("Routed {} of {} inbound events", accepted, total);
            }
        }
    }

    fn on_stream_end(&mut self) {
        if self.connection.is_some() {
            tracing::warn!("Transport event stream ended without a close");
            self.drop_connection();
            self.pending.push_back(Event::Closed {
                reason: DisconnectReason::from_code(None),
            });
        } else {
            self.transport_events = None;
        }
    }

    fn drop_connection(&mut self) {
        self.connection = None;
        self.transport_events = None;
    }

    async fn apply(&mut self, event: Event) {
        tracing::debug!("Event {:?} in state {}", event, self.state.label());

        let state = std::mem::take(&mut self.state);
        let (next, actions) = state.on_event(event);
        self.state = next;

        for action in actions {
            self.execute(action).await;
        }
        self.publish_state();
    }

    async fn execute(&mut self, action: Action) {
        match action {
            Action::Connect => self.connect().await,
            Action::CloseTransport => {
                self.transport_events = None;
                if let Some(connection) = self.connection.take() {
                    connection.close().await;
                }
            }
            Action::PersistCredentials { credentials } => {
                let revision = self.revision.saturating_add(1);
                let credentials = credentials.with_revision(revision);
                match self.store.persist(&credentials).await {
                    Ok(()) => {
                        self.revision = revision;
                        tracing::debug!("Credentials persisted (revision {})", revision);
                    }
                    Err(e) => {
                        tracing::error!("Failed to persist credentials: {}", e);
                        self.pending.push_back(Event::PersistFailed {
                            error: e.to_string(),
                        });
                    }
                }
            }
            Action::ShowChallenge { token } => {
                let challenge = self.pairing.set_challenge(token);
                tracing::info!(
                    "Pairing challenge issued (code {}); confirm it from the primary device",
                    challenge.short_code()
                );
            }
            Action::ClearChallenge => self.pairing.clear(),
            Action::BindSession => match &self.connection {
                Some(connection) => self.session.bind(Arc::clone(connection)),
                None => tracing::warn!("Session opened without a live connection"),
            },
            Action::UnbindSession => self.session.unbind(),
            Action::ScheduleReconnect { attempt } => match self.policy.next_delay(attempt) {
                Some(delay) => {
                    tracing::warn!("Reconnecting in {:?} (attempt {})", delay, attempt);
                    self.reconnect_at = Some(Instant::now() + delay);
                }
                None => {
                    tracing::error!(
                        "Giving up after {} failed attempts; staying disconnected",
                        attempt
                    );
                }
            },
            Action::CancelReconnect => self.reconnect_at = None,
            Action::EmitEvent(event) => self.emit(event),
        }
    }

    /// Open a connection seeded with whatever the store holds right now.
    async fn connect(&mut self) {
        self.publish_state();
        self.reconnect_at = None;

        self.transport_events = None;
        if let Some(stale) = self.connection.take() {
            stale.close().await;
        }

        let credentials = match self.store.load().await {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::error!("Failed to load credentials: {}", e);
                self.pending.push_back(Event::ConnectFailed {
                    error: e.to_string(),
                });
                return;
            }
        };
        self.revision = credentials.revision;
        tracing::debug!(
            "Connecting (registered: {})",
            credentials.is_registered()
        );

        match self.transport.connect(credentials).await {
            Ok(established) => {
                self.connection = Some(established.connection);
                self.transport_events = Some(established.events);
            }
            Err(e) => {
                self.pending.push_back(Event::ConnectFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    fn emit(&self, event: LifecycleEvent) {
        self.publish_state();

        match &event {
            LifecycleEvent::Connected => {
                let identity = self.session.reader().identity();
                tracing::info!(
                    "Session open as {}",
                    identity.as_ref().map(Jid::as_str).unwrap_or("<unregistered>")
                );
            }
            LifecycleEvent::Disconnected { reason } => {
                tracing::warn!("Connection closed: {}", reason);
            }
            LifecycleEvent::LoggedOut => {
                tracing::error!(
                    "Logged out; relink to pair again"
                );
            }
            LifecycleEvent::ConnectionFailed { error } => {
                tracing::warn!("Connection attempt failed: {}", error);
            }
            LifecycleEvent::PersistenceFailed { error } => {
                tracing::error!("Connection aborted, credentials not persisted: {}", error);
            }
        }

        let _ = self.events_tx.send(ManagerEvent::Lifecycle(event));
    }

    fn publish_state(&self) {
        if *self.state_tx.borrow() == self.state {
            return;
        }
        let previous = self.state_tx.send_replace(self.state.clone());
        tracing::info!(
            "Connection state: {} -> {}",
            previous.label(),
            self.state.label()
        );
        let _ = self
            .events_tx
            .send(ManagerEvent::StateChanged(self.state.clone()));
    }
}

async fn next_transport_event(
    events: &mut Option<mpsc::Receiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

async fn reconnect_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Cloneable view of a running manager.
#[derive(Debug, Clone)]
pub struct ManagerHandle {
    session: SessionReader,
    pairing: Arc<PairingChannel>,
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<ManagerEvent>,
    control: mpsc::Sender<Control>,
}

impl ManagerHandle {
    /// Send through the live session.
    ///
    /// `LoggedOut` when the session was revoked, `NotConnected` unless the
    /// session is ready (bound and authenticated), `TransportFailure` when
    /// the send itself failed.
    pub async fn send(&self, to: &Jid, payload: &OutboundPayload) -> Result<Ack, GatewayError> {
        if self.is_logged_out() {
            return Err(GatewayError::LoggedOut);
        }
        if !self.session.is_ready() {
            return Err(GatewayError::NotConnected);
        }
        Ok(self.session.try_send(to, payload).await?)
    }

    /// Session reader for status checks.
    pub fn session(&self) -> &SessionReader {
        &self.session
    }

    /// The current pairing challenge holder.
    pub fn pairing(&self) -> &PairingChannel {
        &self.pairing
    }

    /// Latest published connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Check for the terminal logged-out state.
    pub fn is_logged_out(&self) -> bool {
        self.state.borrow().is_logged_out()
    }

    /// A watch receiver for waiting on state changes.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Subscribe to state changes and lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.events.subscribe()
    }

    /// Ask the manager to connect if it is idle (e.g. after re-pairing).
    pub async fn restart(&self) {
        let _ = self.control.send(Control::Restart).await;
    }

    /// After a logout, erase the stored credentials and connect again so a
    /// new pairing challenge is issued. Ignored in any other state.
    pub async fn relink(&self) {
        let _ = self.control.send(Control::Relink).await;
    }

    /// Ask the manager to close the session and stop.
    pub async fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown).await;
    }
}
