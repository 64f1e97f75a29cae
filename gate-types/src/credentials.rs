//! Durable session identity.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroize;

use crate::Jid;

/// Session identity and key material as handed over by the transport.
///
/// The material is opaque to the gateway. It is stored and reloaded
/// verbatim; only `revision` is maintained on this side.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Monotonic revision, bumped on every persisted update.
    pub revision: u64,
    /// Authenticated identity, present once pairing has completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub me: Option<Jid>,
    /// Opaque key material (base64 in JSON).
    #[serde(
        default,
        serialize_with = "serialize_material",
        deserialize_with = "deserialize_material"
    )]
    material: Vec<u8>,
}

impl Credentials {
    /// The unauthenticated state: nothing stored yet, or logged out.
    pub fn empty() -> Self {
        Self {
            revision: 0,
            me: None,
            material: Vec::new(),
        }
    }

    /// Wrap key material received from the transport.
    pub fn new(me: Option<Jid>, material: Vec<u8>) -> Self {
        Self {
            revision: 0,
            me,
            material,
        }
    }

    /// Same credentials stamped with the given revision.
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// Borrow the key material.
    pub fn material(&self) -> &[u8] {
        &self.material
    }

    /// True when nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.me.is_none() && self.material.is_empty()
    }

    /// True once pairing has produced an identity.
    pub fn is_registered(&self) -> bool {
        self.me.is_some()
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for Credentials {
    fn drop(&mut self) {
        self.material.zeroize();
    }
}

// Opaque on purpose: key material must never reach the logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("revision", &self.revision)
            .field("me", &self.me)
            .field(
                "material",
                &format!("[{} bytes REDACTED]", self.material.len()),
            )
            .finish()
    }
}

fn serialize_material<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
}

fn deserialize_material<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::USER_SUFFIX;

    #[test]
    fn empty_is_unauthenticated() {
        let creds = Credentials::empty();
        assert!(creds.is_empty());
        assert!(!creds.is_registered());
        assert_eq!(creds.revision, 0);
    }

    #[test]
    fn json_keeps_material_verbatim() {
        let creds = Credentials::new(Some(Jid::new("1555", USER_SUFFIX)), vec![0, 1, 2, 255])
            .with_revision(7);
        let json = serde_json::to_string(&creds).unwrap();
        assert!(json.contains("\"material\":\"AAEC/w==\""));

        let restored: Credentials = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, creds);
    }

    #[test]
    fn missing_fields_load_as_empty() {
        let restored: Credentials = serde_json::from_str(r#"{"revision":0}"#).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn debug_redacts_material() {
        let creds = Credentials::new(None, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let debug = format!("{:?}", creds);
        assert!(debug.contains("[4 bytes REDACTED]"));
        assert!(!debug.to_lowercase().contains("dead"));
    }
}
