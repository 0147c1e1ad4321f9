use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Errors from converting a hex string into the store-native identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("invalid id: expected 24 hex characters, got {len}")]
    InvalidLength { len: usize },
    #[error("invalid id: {0:?} is not valid hex")]
    InvalidHex(String),
}

/// Store-native record identity: 12 bytes, rendered as 24 lowercase hex characters.
///
/// Layout of generated ids: 4-byte big-endian seconds since the epoch, 5 random
/// bytes fixed per process, and a 3-byte wrapping counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 12]);

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn process_unique() -> [u8; 5] {
    static UNIQUE: std::sync::OnceLock<[u8; 5]> = std::sync::OnceLock::new();
    *UNIQUE.get_or_init(rand::random)
}

impl ObjectId {
    /// Generates a fresh identity.
    #[must_use]
    pub fn new() -> Self {
        // Seconds fit in 32 bits until 2106.
        #[allow(clippy::cast_possible_truncation)]
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as u32);
        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(&process_unique());
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    /// Builds an identity from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Parses a 24-character hex string.
    ///
    /// # Errors
    ///
    /// Returns [`IdError`] if the input is not exactly 24 hex digits.
    pub fn parse_str(s: &str) -> Result<Self, IdError> {
        if s.len() != 24 {
            return Err(IdError::InvalidLength { len: s.len() });
        }
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| IdError::InvalidHex(s.to_string()))?;
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    #[must_use]
    pub const fn bytes(&self) -> [u8; 12] {
        self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A single stored field value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldValue {
    String(String),
    Bool(bool),
    Int(i64),
    ObjectId(ObjectId),
}

impl FieldValue {
    /// Returns `true` for the zero value of the underlying type.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::String(s) => s.is_empty(),
            Self::Bool(b) => !b,
            Self::Int(i) => *i == 0,
            Self::ObjectId(_) => false,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Self::ObjectId(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<ObjectId> for FieldValue {
    fn from(value: ObjectId) -> Self {
        Self::ObjectId(value)
    }
}

/// A persisted record: storage key to value.
///
/// Uses `BTreeMap` for deterministic iteration order.
pub type Document = BTreeMap<String, FieldValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_hex() {
        let id = ObjectId::parse_str("5f1d7a3b9c2e4a0012345678").unwrap();
        assert_eq!(id.to_hex(), "5f1d7a3b9c2e4a0012345678");
        assert_eq!(id.to_string(), "5f1d7a3b9c2e4a0012345678");
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert_eq!(
            ObjectId::parse_str("abc"),
            Err(IdError::InvalidLength { len: 3 })
        );
        assert!(matches!(
            ObjectId::parse_str(""),
            Err(IdError::InvalidLength { len: 0 })
        ));
    }

    #[test]
    fn parse_rejects_non_hex() {
        let err = ObjectId::parse_str("zzzzzzzzzzzzzzzzzzzzzzzz").unwrap_err();
        assert!(matches!(err, IdError::InvalidHex(_)));
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_eq!(ObjectId::parse_str(&a.to_hex()).unwrap(), a);
    }

    #[test]
    fn zero_values() {
        assert!(FieldValue::from("").is_zero());
        assert!(!FieldValue::from("x").is_zero());
        assert!(FieldValue::Bool(false).is_zero());
        assert!(!FieldValue::Bool(true).is_zero());
        assert!(!FieldValue::ObjectId(ObjectId::new()).is_zero());
    }

    #[test]
    fn object_id_serializes_as_hex_string() {
        let id = ObjectId::from_bytes([0xab; 12]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abababababababababababab\"");
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
