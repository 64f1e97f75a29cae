//! Reconnect policies.
//!
//! The state machine only says *that* a reconnect is due; a
//! [`ReconnectPolicy`] decides *when*. The default [`Immediate`] policy
//! restarts right away on every non-logout close, with no attempt cap.
//! [`ExponentialBackoff`] adds bounded, jittered delays without changing
//! the state machine.

use std::fmt;
use std::time::Duration;

/// Decides the delay before reconnect attempt `attempt` (1-based).
pub trait ReconnectPolicy: Send + Sync + fmt::Debug {
    /// `None` gives up and leaves the manager disconnected.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Reconnect immediately, forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Immediate;

impl ReconnectPolicy for Immediate {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        Some(Duration::ZERO)
    }
}

/// Exponential backoff with jitter and an optional attempt cap.
///
/// Formula: min(cap, 2^attempt seconds) + random(0..=max_jitter)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Upper bound for the exponential part.
    pub cap: Duration,
    /// Upper bound for the random jitter.
    pub max_jitter: Duration,
    /// Give up after this many consecutive failures.
    pub max_attempts: Option<u32>,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            cap: Duration::from_secs(30),
            max_jitter: Duration::from_millis(5000),
            max_attempts: None,
        }
    }
}

impl ExponentialBackoff {
    /// Set the attempt cap.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay without jitter.
    fn base_delay(&self, attempt: u32) -> Duration {
        let base = Duration::from_secs(2u64.pow(attempt.min(16)));
        base.min(self.cap)
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }
        let jitter_ms = random_jitter_ms(self.max_jitter.as_millis() as u64);
        Some(self.base_delay(attempt) + Duration::from_millis(jitter_ms))
    }
}

/// Random jitter in `0..=max_ms`; no jitter if the OS RNG is unavailable.
fn random_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut bytes = [0u8; 8];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes) % (max_ms + 1),
        Err(_) => 0,
    }
}
