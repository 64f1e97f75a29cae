//! The current pairing challenge, shared with the HTTP surface.
//!
//! Only the lifecycle manager writes; readers take clones.

use gate_core::{PairingChallenge, DEFAULT_CHALLENGE_TTL};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Holds at most one pairing challenge.
#[derive(Debug)]
pub struct PairingChannel {
    current: RwLock<Option<PairingChallenge>>,
    ttl: Duration,
}

impl Default for PairingChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CHALLENGE_TTL)
    }
}

impl PairingChannel {
    /// Create an empty channel whose challenges live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            current: RwLock::new(None),
            ttl,
        }
    }

    /// Replace the current challenge with a freshly issued one.
    pub fn set_challenge(&self, token: impl Into<String>) -> PairingChallenge {
        let challenge = PairingChallenge::with_ttl(token, self.ttl);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(challenge.clone());
        challenge
    }

    /// Drop the current challenge. Idempotent.
    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The current challenge, if one is valid and unexpired.
    pub fn current(&self) -> Option<PairingChallenge> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|challenge| challenge.is_usable())
            .cloned()
    }
}
