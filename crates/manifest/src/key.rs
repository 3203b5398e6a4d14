use std::cmp::Ordering;
use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

/// Kind of entry an internal key refers to.
///
/// The byte values are part of the on-disk format. `Deletion` sorts before
/// `Value` so that, within one user key and sequence number, a tombstone is
/// shadowed by a write (keys sort by descending type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValueType {
    /// Deletion marker (tombstone).
    Deletion = 0,
    /// Normal value.
    Value = 1,
}

impl ValueType {
    /// Parses the on-disk tag byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ValueType::Deletion),
            1 => Some(ValueType::Value),
            _ => None,
        }
    }

    /// The on-disk tag byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// A user key augmented with a sequence number and a [`ValueType`].
///
/// Internal keys give every version of a user key a distinct, totally
/// ordered identity: user key ascending, then sequence descending (newest
/// first), then type descending.
///
/// On disk the key is the user key followed by an 8-byte little-endian
/// trailer packing `(sequence << 8) | type`:
///
/// ```text
/// [user_key ...][(seq << 8) | type: u64 LE]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalKey {
    user_key: Vec<u8>,
    sequence: u64,
    value_type: ValueType,
}

impl InternalKey {
    /// Largest representable sequence number (56 bits; the low byte of the
    /// trailer holds the type).
    pub const MAX_SEQUENCE: u64 = (1 << 56) - 1;

    /// Creates an internal key. `sequence` must fit in 56 bits.
    pub fn new(user_key: impl Into<Vec<u8>>, sequence: u64, value_type: ValueType) -> Self {
        debug_assert!(sequence <= Self::MAX_SEQUENCE);
        Self {
            user_key: user_key.into(),
            sequence,
            value_type,
        }
    }

    /// The user-supplied portion of the key.
    #[must_use]
    pub fn user_key(&self) -> &[u8] {
        &self.user_key
    }

    /// The version this key was written at.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Appends the encoded form to `dst`.
    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        dst.extend_from_slice(&self.user_key);
        let packed = (self.sequence << 8) | u64::from(self.value_type.to_byte());
        let mut trailer = [0u8; 8];
        LittleEndian::write_u64(&mut trailer, packed);
        dst.extend_from_slice(&trailer);
    }

    /// The encoded form as a fresh buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut dst = Vec::with_capacity(self.user_key.len() + 8);
        self.encode_to(&mut dst);
        dst
    }

    /// Parses an encoded internal key. Returns `None` if the buffer is too
    /// short to hold the trailer or the type byte is unknown.
    pub fn decode(encoded: &[u8]) -> Option<Self> {
        if encoded.len() < 8 {
            return None;
        }
        let (user_key, trailer) = encoded.split_at(encoded.len() - 8);
        let packed = LittleEndian::read_u64(trailer);
        let value_type = ValueType::from_byte((packed & 0xff) as u8)?;
        Some(Self {
            user_key: user_key.to_vec(),
            sequence: packed >> 8,
            value_type,
        })
    }
}

impl Ord for InternalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.user_key
            .cmp(&other.user_key)
            .then_with(|| other.sequence.cmp(&self.sequence))
            .then_with(|| other.value_type.cmp(&self.value_type))
    }
}

impl PartialOrd for InternalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for InternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} @ {} : {}",
            String::from_utf8_lossy(&self.user_key),
            self.sequence,
            self.value_type.to_byte()
        )
    }
}
