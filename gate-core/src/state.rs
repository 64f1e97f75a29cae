//! Connection lifecycle state machine for linkgate.
//!
//! This module provides a pure, side-effect-free state machine for the
//! single messaging session. It takes events as input and produces a new
//! state plus a list of actions to execute.
//!
//! The actual I/O (connecting, persisting credentials, binding the session)
//! is performed by the lifecycle manager in gate-client, not by this module.
//! Actions are listed in the order they must be executed.

use gate_types::{Credentials, DisconnectReason};

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live connection.
    Disconnected {
        /// Why the last connection ended. `None` before the first attempt,
        /// after a shutdown, or after a locally aborted attempt.
        reason: Option<DisconnectReason>,
        /// Consecutive failed attempts since the last successful open.
        failures: u32,
    },
    /// A transport connection is being established or authenticated.
    Connecting {
        /// Zero for the first attempt after a success or boot.
        attempt: u32,
    },
    /// The transport reported the session open.
    Connected,
}

impl ConnectionState {
    /// Create a new state machine in the Disconnected state.
    pub fn new() -> Self {
        Self::Disconnected {
            reason: None,
            failures: 0,
        }
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller is responsible
    /// for executing the returned actions in order.
    pub fn on_event(self, event: Event) -> (Self, Vec<Action>) {
        match (self, event) {
            // Shutdown wins from any state
            (_, Event::ShutdownRequested) => (
                Self::new(),
                vec![
                    Action::CancelReconnect,
                    Action::CloseTransport,
                    Action::UnbindSession,
                    Action::ClearChallenge,
                ],
            ),

            // From Disconnected
            (Self::Disconnected { failures, .. }, Event::StartRequested) => (
                Self::Connecting { attempt: failures },
                vec![Action::Connect],
            ),

            // From Connecting
            (Self::Connecting { .. }, Event::Opened) => (
                Self::Connected,
                vec![
                    Action::ClearChallenge,
                    Action::BindSession,
                    Action::EmitEvent(LifecycleEvent::Connected),
                ],
            ),
            (Self::Connecting { attempt }, Event::ConnectFailed { error }) => {
                let failures = attempt.saturating_add(1);
                (
                    Self::Disconnected {
                        reason: Some(DisconnectReason::Unknown { code: None }),
                        failures,
                    },
                    vec![
                        Action::EmitEvent(LifecycleEvent::ConnectionFailed { error }),
                        Action::ScheduleReconnect { attempt: failures },
                    ],
                )
            }
            (state @ Self::Connecting { .. }, Event::ChallengeIssued { token }) => {
                (state, vec![Action::ShowChallenge { token }])
            }
            (Self::Connecting { attempt }, Event::Closed { reason }) => {
                closed(reason, attempt.saturating_add(1))
            }

            // From Connected
            (Self::Connected, Event::Closed { reason }) => closed(reason, 1),

            // Credential updates are persisted before anything else happens
            (
                state @ (Self::Connecting { .. } | Self::Connected),
                Event::CredentialsUpdated { credentials },
            ) => (state, vec![Action::PersistCredentials { credentials }]),

            // A failed write aborts the attempt that produced the credentials
            (state @ (Self::Connecting { .. } | Self::Connected), Event::PersistFailed { error }) => {
                let failures = match state {
                    Self::Connecting { attempt } => attempt.saturating_add(1),
                    _ => 1,
                };
                (
                    Self::Disconnected {
                        reason: None,
                        failures,
                    },
                    vec![
                        Action::CloseTransport,
                        Action::UnbindSession,
                        Action::EmitEvent(LifecycleEvent::PersistenceFailed { error }),
                        Action::ScheduleReconnect { attempt: failures },
                    ],
                )
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the transport reported the session open.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if a connection attempt is in flight.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting { .. })
    }

    /// Check for the terminal logged-out state that needs fresh pairing.
    pub fn is_logged_out(&self) -> bool {
        matches!(
            self,
            Self::Disconnected {
                reason: Some(DisconnectReason::LoggedOut),
                ..
            }
        )
    }

    /// Reason of the last close, if disconnected.
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        match self {
            Self::Disconnected { reason, .. } => *reason,
            _ => None,
        }
    }

    /// Short lowercase name for logs and health output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected { .. } if self.is_logged_out() => "logged_out",
            Self::Disconnected { .. } => "disconnected",
            Self::Connecting { .. } => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Transition for a transport close.
fn closed(reason: DisconnectReason, failures: u32) -> (ConnectionState, Vec<Action>) {
    if reason.is_logged_out() {
        return (
            ConnectionState::Disconnected {
                reason: Some(reason),
                failures: 0,
            },
            vec![
                Action::UnbindSession,
                Action::ClearChallenge,
                Action::EmitEvent(LifecycleEvent::Disconnected { reason }),
                Action::EmitEvent(LifecycleEvent::LoggedOut),
            ],
        );
    }

    (
        ConnectionState::Disconnected {
            reason: Some(reason),
            failures,
        },
        vec![
            Action::UnbindSession,
            Action::EmitEvent(LifecycleEvent::Disconnected { reason }),
            Action::ScheduleReconnect { attempt: failures },
        ],
    )
}

/// Events that drive the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Boot, an explicit restart, or a policy-driven retry.
    StartRequested,
    /// The transport could not start a connection at all.
    ConnectFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The transport needs the user to confirm a new pairing challenge.
    ChallengeIssued {
        /// The challenge token.
        token: String,
    },
    /// The transport produced new credential material.
    CredentialsUpdated {
        /// The full credential set to persist.
        credentials: Credentials,
    },
    /// The transport reported the session open and authenticated.
    Opened,
    /// The transport reported the connection closed.
    Closed {
        /// Classified close reason.
        reason: DisconnectReason,
    },
    /// Persisting credentials failed.
    PersistFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The process is shutting down.
    ShutdownRequested,
}

/// Actions to be executed by the lifecycle manager.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Establish a transport connection seeded with stored credentials.
    Connect,
    /// Close the current transport connection, if any.
    CloseTransport,
    /// Write credentials durably before processing further events.
    PersistCredentials {
        /// The credentials to write.
        credentials: Credentials,
    },
    /// Replace the current pairing challenge.
    ShowChallenge {
        /// The challenge token.
        token: String,
    },
    /// Invalidate the current pairing challenge.
    ClearChallenge,
    /// Bind the live connection to the session handle.
    BindSession,
    /// Unbind the session handle.
    UnbindSession,
    /// Ask the reconnect policy when to start again.
    ScheduleReconnect {
        /// Consecutive failures so far (1-based).
        attempt: u32,
    },
    /// Drop any pending reconnect.
    CancelReconnect,
    /// Publish a lifecycle event to observers.
    EmitEvent(LifecycleEvent),
}

/// Events published to observers of the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The session is open and bound.
    Connected,
    /// The connection closed.
    Disconnected {
        /// Classified close reason.
        reason: DisconnectReason,
    },
    /// The session was revoked; automatic reconnects stop.
    LoggedOut,
    /// The transport could not start a connection.
    ConnectionFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Credentials could not be persisted; the attempt was aborted.
    PersistenceFailed {
        /// Error message describing the failure.
        error: String,
    },
}
