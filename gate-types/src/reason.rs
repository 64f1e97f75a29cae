//! Close-code classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Close code the network sends when the linked device was removed.
pub const CODE_LOGGED_OUT: u16 = 401;

/// Close codes after which a plain reconnect is expected to succeed.
///
/// 408 connection lost / timed out, 428 connection closed, 440 connection
/// replaced, 500 bad session, 503 service unavailable, 515 restart required.
pub const RESTARTABLE_CODES: [u16; 6] = [408, 428, 440, 500, 503, 515];

/// Why a connection closed, mirrored from the transport's close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The session was revoked; credentials are no longer valid.
    LoggedOut,
    /// A known transient condition.
    Restartable {
        /// The transport's close code.
        code: u16,
    },
    /// Anything else, including closes without a code.
    Unknown {
        /// The transport's close code, if it sent one.
        code: Option<u16>,
    },
}

impl DisconnectReason {
    /// Classify a transport close code.
    pub fn from_code(code: Option<u16>) -> Self {
        match code {
            Some(CODE_LOGGED_OUT) => Self::LoggedOut,
            Some(c) if RESTARTABLE_CODES.contains(&c) => Self::Restartable { code: c },
            other => Self::Unknown { code: other },
        }
    }

    /// The integer code this reason was derived from.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::LoggedOut => Some(CODE_LOGGED_OUT),
            Self::Restartable { code } => Some(*code),
            Self::Unknown { code } => *code,
        }
    }

    /// True for the terminal reason that requires fresh pairing.
    pub fn is_logged_out(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggedOut => write!(f, "logged out"),
            Self::Restartable { code } => write!(f, "restartable ({})", code),
            Self::Unknown { code: Some(code) } => write!(f, "unknown ({})", code),
            Self::Unknown { code: None } => write!(f, "unknown"),
        }
    }
}
