//! Routable addresses on the messaging network.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::GatewayError;

/// Server suffix for individual user addresses.
pub const USER_SUFFIX: &str = "s.whatsapp.net";

/// Server suffix for group addresses.
pub const GROUP_SUFFIX: &str = "g.us";

/// Server suffix for broadcast lists and status updates.
pub const BROADCAST_SUFFIX: &str = "broadcast";

/// Whether an address names a single user or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressClass {
    /// A single user (or anything that is not a group).
    User,
    /// A group conversation.
    Group,
}

impl fmt::Display for AddressClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressClass::User => write!(f, "user"),
            AddressClass::Group => write!(f, "group"),
        }
    }
}

/// A JID: `<user>@<server>`.
///
/// Stored verbatim; the server part decides the [`AddressClass`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jid(String);

impl Jid {
    /// Build a JID from its user and server parts.
    pub fn new(user: &str, server: &str) -> Self {
        Self(format!("{}@{}", user, server))
    }

    /// Wrap an already formatted JID string.
    ///
    /// Returns `None` unless the string has a non-empty server part after `@`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (_, server) = raw.rsplit_once('@')?;
        if server.is_empty() {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    /// Normalize a caller-supplied destination into a JID.
    ///
    /// Group addresses pass through unchanged. Anything else is treated as a
    /// phone number: every non-digit character is stripped and the user
    /// suffix appended, so `"+1 (555) 123-4567"` becomes
    /// `"15551234567@s.whatsapp.net"`.
    pub fn from_destination(destination: &str) -> Result<Self, GatewayError> {
        let trimmed = destination.trim();
        if trimmed.ends_with(&format!("@{}", GROUP_SUFFIX)) {
            return Ok(Self(trimmed.to_string()));
        }

        let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(GatewayError::InvalidRequest(format!(
                "destination '{}' contains no digits",
                destination
            )));
        }
        Ok(Self::new(&digits, USER_SUFFIX))
    }

    /// The part before `@`.
    pub fn user(&self) -> &str {
        self.0.rsplit_once('@').map(|(user, _)| user).unwrap_or("")
    }

    /// The part after `@`.
    pub fn server(&self) -> &str {
        self.0.rsplit_once('@').map(|(_, server)| server).unwrap_or("")
    }

    /// Classify by server suffix.
    pub fn class(&self) -> AddressClass {
        if self.is_group() {
            AddressClass::Group
        } else {
            AddressClass::User
        }
    }

    /// True for group addresses (`...@g.us`).
    pub fn is_group(&self) -> bool {
        self.server() == GROUP_SUFFIX
    }

    /// True for broadcast lists and status updates (`...@broadcast`).
    pub fn is_broadcast(&self) -> bool {
        self.server() == BROADCAST_SUFFIX
    }

    /// Borrow the full string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Jid({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_number_is_normalized() {
        let jid = Jid::from_destination("+1 (555) 123-4567").unwrap();
        assert_eq!(jid.as_str(), "15551234567@s.whatsapp.net");
        assert_eq!(jid.class(), AddressClass::User);
    }

    #[test]
    fn group_destination_passes_through() {
        let raw = "120363041234567890@g.us";
        let jid = Jid::from_destination(raw).unwrap();
        assert_eq!(jid.as_str(), raw);
        assert_eq!(jid.class(), AddressClass::Group);
    }

    #[test]
    fn destination_without_digits_is_rejected() {
        let result = Jid::from_destination("not a number");
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[test]
    fn user_jid_with_suffix_is_renormalized() {
        // Only the group suffix is passed through; a user JID is rebuilt from digits.
        let jid = Jid::from_destination("34600111222@s.whatsapp.net").unwrap();
        assert_eq!(jid.as_str(), "34600111222@s.whatsapp.net");
    }

    #[test]
    fn parse_requires_server_part() {
        assert!(Jid::parse("12345").is_none());
        assert!(Jid::parse("12345@").is_none());
        assert_eq!(Jid::parse("12345@g.us").unwrap().server(), "g.us");
    }

    #[test]
    fn broadcast_is_detected() {
        let jid = Jid::parse("status@broadcast").unwrap();
        assert!(jid.is_broadcast());
        assert!(!jid.is_group());
        assert_eq!(jid.class(), AddressClass::User);
    }

    #[test]
    fn user_and_server_split() {
        let jid = Jid::new("15551234567", USER_SUFFIX);
        assert_eq!(jid.user(), "15551234567");
        assert_eq!(jid.server(), USER_SUFFIX);
    }

    #[test]
    fn serializes_as_plain_string() {
        let jid = Jid::new("1", GROUP_SUFFIX);
        assert_eq!(serde_json::to_string(&jid).unwrap(), "\"1@g.us\"");
    }
}
