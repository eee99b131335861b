//! Sortable 16-byte identifiers
//!
//! An [`Id`] is a ULID: a 48-bit millisecond timestamp followed by 80 bits of
//! entropy. Byte-wise ordering therefore approximates creation order, and ids
//! generated by one process are strictly increasing.
//!
//! The canonical text form is 26 characters of Crockford base32, which is what
//! shows up in logs. On the wire an id is the raw 16 bytes.

use parking_lot::Mutex;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;
use ulid::{Generator, Ulid};

/// Number of bytes in an encoded id
pub const ID_LEN: usize = 16;

/// Number of characters in the canonical text form
pub const ID_TEXT_LEN: usize = 26;

static GENERATOR: LazyLock<Mutex<Generator>> = LazyLock::new(|| Mutex::new(Generator::new()));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("invalid id length: expected {ID_LEN} bytes, got {0}")]
    InvalidLength(usize),

    #[error("invalid id text length: expected {ID_TEXT_LEN} characters, got {0}")]
    InvalidTextLength(usize),

    #[error("invalid id text: {0}")]
    InvalidText(String),

    #[error("id text overflows 128 bits")]
    Overflow,
}

/// A 16-byte, lexicographically sortable identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(Ulid);

impl Id {
    /// Generate a fresh id for the current millisecond.
    ///
    /// Ids from the same process are strictly increasing: within one
    /// millisecond the generator increments the previous id instead of
    /// drawing new entropy.
    pub fn new_now() -> Self {
        // only fails once 2^80 ids were drawn in a single millisecond
        let ulid = GENERATOR.lock().generate().unwrap_or_else(|_| Ulid::new());
        Self(ulid)
    }

    /// Decode an id from raw bytes. Fails unless exactly 16 bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdError> {
        let array: [u8; ID_LEN] = bytes
            .try_into()
            .map_err(|_| IdError::InvalidLength(bytes.len()))?;
        Ok(Self::from_array(array))
    }

    /// Decode the 26-character Crockford base32 form (case-insensitive).
    pub fn from_text(text: &str) -> Result<Self, IdError> {
        if text.len() != ID_TEXT_LEN {
            return Err(IdError::InvalidTextLength(text.len()));
        }
        // the leading character only carries the top 3 bits
        if matches!(text.as_bytes()[0], b'8'..=b'9' | b'A'..=b'Z' | b'a'..=b'z') {
            return Err(IdError::Overflow);
        }
        Ulid::from_string(&text.to_ascii_uppercase())
            .map(Self)
            .map_err(|e| IdError::InvalidText(e.to_string()))
    }

    pub fn from_array(bytes: [u8; ID_LEN]) -> Self {
        Self(Ulid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> [u8; ID_LEN] {
        self.0.to_bytes()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    /// Millisecond timestamp embedded in the id.
    pub fn timestamp_millis(&self) -> u64 {
        self.0.timestamp_ms()
    }

    /// Three-way comparison: -1, 0 or 1. Same order as `Ord`.
    pub fn compare(&self, other: &Id) -> i8 {
        match self.cmp(other) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }
    }
}

impl Default for Id {
    fn default() -> Self {
        Self(Ulid::nil())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.0)
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s)
    }
}

impl TryFrom<&[u8]> for Id {
    type Error = IdError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl From<Id> for Vec<u8> {
    fn from(id: Id) -> Self {
        id.to_vec()
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.as_bytes())
    }
}

struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = Id;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("16 id bytes or a 26 character id string")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Id, E> {
        Id::from_bytes(v).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Id, E> {
        Id::from_text(v).map_err(E::custom)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Id, A::Error> {
        let mut bytes = Vec::with_capacity(ID_LEN);
        while let Some(byte) = seq.next_element::<u8>()? {
            bytes.push(byte);
        }
        Id::from_bytes(&bytes).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(IdVisitor)
    }
}
