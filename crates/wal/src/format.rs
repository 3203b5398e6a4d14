//! On-disk framing constants, record types, and the masked-CRC transform.

use crc32c::{crc32c, crc32c_append};

/// Physical block size of a log file (32 KiB).
///
/// The file is a sequence of blocks; records never straddle a block boundary
/// mid-header. A block's unusable trailer (fewer than [`HEADER_SIZE`] bytes)
/// is zero-filled.
pub const BLOCK_SIZE: usize = 32 * 1024;

/// Record header size: CRC (4) + length (2) + type (1) = 7 bytes.
pub const HEADER_SIZE: usize = 7;

/// Largest payload a single physical record can carry.
pub const MAX_FRAGMENT_SIZE: usize = BLOCK_SIZE - HEADER_SIZE;

/// Type tag of a physical record.
///
/// A logical record that fits in the current block is written as a single
/// `Full` fragment. Otherwise it is split into `First`, zero or more
/// `Middle`, and a final `Last` fragment. Byte 0 is reserved (it is what a
/// preallocated or zero-padded region reads back as) and is never written
/// by [`LogWriter`](crate::LogWriter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Complete record in a single fragment.
    Full = 1,
    /// First fragment of a multi-fragment record.
    First = 2,
    /// Interior fragment.
    Middle = 3,
    /// Final fragment.
    Last = 4,
}

impl RecordType {
    /// Parses a type byte. Returns `None` for 0 (reserved) and anything > 4.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(RecordType::Full),
            2 => Some(RecordType::First),
            3 => Some(RecordType::Middle),
            4 => Some(RecordType::Last),
            _ => None,
        }
    }

    /// The on-disk type byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Constant used by the CRC mask transform.
const MASK_DELTA: u32 = 0xa282_ead8;

/// Masks a CRC before storage.
///
/// Stored checksums are rotated and offset so that a buffer whose contents
/// happen to include an embedded CRC of itself (or runs of zero bytes that
/// checksum to zero) still fails verification. The transform is the fixed
/// affine map from the original format: rotate right 15 bits, add
/// `0xa282ead8`. It must not be changed — existing files depend on it.
#[must_use]
pub fn mask_crc(crc: u32) -> u32 {
    ((crc >> 15) | (crc << 17)).wrapping_add(MASK_DELTA)
}

/// Inverts [`mask_crc`].
#[must_use]
pub fn unmask_crc(masked: u32) -> u32 {
    let rot = masked.wrapping_sub(MASK_DELTA);
    (rot >> 17) | (rot << 15)
}

/// Computes the (unmasked) CRC32C of a physical record: the type byte
/// followed by the fragment payload.
///
/// The polynomial is part of the on-disk format; files must verify under
/// any conformant CRC32C (Castagnoli) implementation.
#[must_use]
pub fn record_crc(ty: RecordType, fragment: &[u8]) -> u32 {
    crc32c_append(crc32c(&[ty.to_byte()]), fragment)
}
