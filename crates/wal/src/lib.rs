//! # WAL — write-ahead-log record framing
//!
//! Frames logical records into the checksummed, block-aligned physical
//! layout that gives the storage engine crash-safe durability. Every
//! mutation batch is appended here **before** the corresponding in-memory
//! update; on restart the log is replayed to reconstruct acknowledged
//! writes. The manifest uses the same framing, so this crate is the
//! durability substrate for both user data and table metadata.
//!
//! ## Physical layout
//!
//! The file is a sequence of 32 KiB blocks. Each block holds zero or more
//! physical records:
//!
//! ```text
//! [crc: u32 LE][length: u16 LE][type: u8][payload ...]
//! ```
//!
//! `crc` is the masked CRC32C of the type byte plus the payload. `type` is
//! one of `Full`/`First`/`Middle`/`Last` (1..4); a logical record larger
//! than the space left in a block is fragmented across blocks. If fewer
//! than 7 bytes remain in a block the trailer is zero-filled and writing
//! continues at the next block boundary, so a header never straddles a
//! block.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wal::{LogWriter, LogReader};
//!
//! let mut w = LogWriter::open("data.log").unwrap();
//! w.add_record(b"hello").unwrap();
//! drop(w);
//!
//! let mut r = LogReader::open("data.log").unwrap();
//! while let Some(rec) = r.read_record().unwrap() {
//!     println!("{} bytes", rec.len());
//! }
//! ```

use std::io;

use thiserror::Error;

mod format;
mod reader;
mod writer;

pub use format::{
    mask_crc, record_crc, unmask_crc, RecordType, BLOCK_SIZE, HEADER_SIZE, MAX_FRAGMENT_SIZE,
};
pub use reader::{LogReader, Records};
pub use writer::{LogWriter, RecordSink};

/// Errors from log framing.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying sink/source I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A record that does not parse: checksum mismatch, reserved type
    /// byte, or a length running past its block.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The writer saw an earlier append fail and refuses further records.
    /// Open a new log file; this one may end in a misaligned block.
    #[error("log writer poisoned by earlier write failure")]
    Poisoned,
}
