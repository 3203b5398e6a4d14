//! # Manifest — version-edit delta codec
//!
//! The manifest is the persistent record of which sorted-table files exist
//! at which level. It is written as a log of deltas: every metadata
//! transaction (a flush adding an L0 file, a compaction swapping inputs for
//! outputs) builds a [`VersionEdit`], serializes it, and appends it as one
//! logical record to the manifest log — which uses the same framing as the
//! WAL. On recovery the edits are decoded in order and replayed to rebuild
//! the live file set.
//!
//! ## Wire format
//!
//! An edit is a sequence of tagged fields; only fields that were set are
//! present, and repeated fields appear once per entry:
//!
//! ```text
//! [tag: varint][body]...
//!
//! tag 1  comparator        length-prefixed string
//! tag 2  log number        varint
//! tag 3  next file number  varint
//! tag 4  last sequence     varint
//! tag 5  compact pointer   varint level + length-prefixed internal key
//! tag 6  deleted file      varint level + varint file number
//! tag 7  new file          varint level + varint number + varint size
//!                          + length-prefixed smallest + largest keys
//! tag 9  prev log number   varint
//! ```
//!
//! Decoding is all-or-nothing: unknown tags, truncated varints or strings,
//! and out-of-range levels abort with [`ManifestError::Corrupt`] naming the
//! offending field, and the caller must discard the partial edit.

use thiserror::Error;

mod coding;
mod edit;
mod key;

pub use edit::{FileMetaData, VersionEdit, NUM_LEVELS};
pub use key::{InternalKey, ValueType};

/// Errors from the version-edit codec.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A version edit that does not parse; the payload names the field
    /// being decoded when the input ran out or stopped making sense.
    #[error("corrupt version edit: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests;
