use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::format::{record_crc, mask_crc, RecordType, BLOCK_SIZE, HEADER_SIZE};
use crate::WalError;

/// Sequential byte sink the log writer appends to.
///
/// This is the only capability the framing layer needs from the storage
/// layer: append bytes, and flush them down to the next layer. Durability
/// policy (fsync timing, retries, timeouts) belongs to the owner of the
/// sink, not to the writer.
pub trait RecordSink {
    /// Appends `data` to the end of the sink.
    fn append(&mut self, data: &[u8]) -> io::Result<()>;
    /// Pushes buffered bytes down to the underlying file.
    fn flush(&mut self) -> io::Result<()>;
}

/// Any `io::Write` is a valid sink; `append` maps to `write_all`.
impl<W: Write> RecordSink for W {
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        self.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(self)
    }
}

/// Appends logical records to a log file as checksummed, block-aligned
/// physical fragments.
///
/// ## Failure contract
///
/// Once [`add_record`](LogWriter::add_record) returns an error the writer is
/// permanently unusable: bytes may already have reached the sink and there
/// is no way to un-commit them, so the internal block accounting assumes
/// forward progress happened. Further calls fail fast with
/// [`WalError::Poisoned`]. The caller must discard the writer and switch to
/// a fresh log file; retrying on the same file risks a misaligned block.
pub struct LogWriter<S: RecordSink> {
    sink: S,
    /// Bytes already used in the current 32 KiB block.
    block_offset: usize,
    /// Set on the first failed append; all later calls are rejected.
    poisoned: bool,
}

impl LogWriter<BufWriter<std::fs::File>> {
    /// Opens (or creates) a log file at `path` in append mode.
    ///
    /// The current file length seeds the block offset so that writing
    /// resumes correctly mid-block after a reopen.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();
        Ok(Self::with_length(
            BufWriter::with_capacity(BLOCK_SIZE, file),
            len,
        ))
    }
}

impl<S: RecordSink> LogWriter<S> {
    /// Creates a writer over a fresh (empty) sink.
    pub fn new(sink: S) -> Self {
        Self::with_length(sink, 0)
    }

    /// Creates a writer over a sink that already holds `length` bytes.
    ///
    /// `length` must be the exact current file length; the block offset
    /// resumes at `length % BLOCK_SIZE`.
    pub fn with_length(sink: S, length: u64) -> Self {
        Self {
            sink,
            block_offset: (length % BLOCK_SIZE as u64) as usize,
            poisoned: false,
        }
    }

    /// Appends one logical record.
    ///
    /// The payload is split into as many physical fragments as needed; an
    /// empty payload still emits a single zero-length `Full` fragment so
    /// the record is visible to readers. Stops at the first sink failure
    /// without attempting further fragments.
    ///
    /// # Errors
    ///
    /// Any error is fatal for this writer — see the type-level failure
    /// contract. Returns [`WalError::Poisoned`] if a previous call failed.
    pub fn add_record(&mut self, payload: &[u8]) -> Result<(), WalError> {
        if self.poisoned {
            return Err(WalError::Poisoned);
        }
        match self.add_record_inner(payload) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.poisoned = true;
                Err(e)
            }
        }
    }

    fn add_record_inner(&mut self, payload: &[u8]) -> Result<(), WalError> {
        let mut left = payload.len();
        let mut ptr = 0;
        let mut begin = true;

        loop {
            let leftover = BLOCK_SIZE - self.block_offset;

            // Too small for even a header: zero-fill the trailer and start
            // the next block.
            if leftover < HEADER_SIZE {
                if leftover > 0 {
                    self.sink.append(&[0u8; HEADER_SIZE - 1][..leftover])?;
                }
                self.block_offset = 0;
            }

            // Invariant: at least HEADER_SIZE bytes remain in the block.
            let avail = BLOCK_SIZE - self.block_offset - HEADER_SIZE;
            let fragment_len = left.min(avail);
            let end = left == fragment_len;

            let ty = if begin && end {
                RecordType::Full
            } else if begin {
                RecordType::First
            } else if end {
                RecordType::Last
            } else {
                RecordType::Middle
            };

            self.emit_physical_record(ty, &payload[ptr..ptr + fragment_len])?;

            ptr += fragment_len;
            left -= fragment_len;
            begin = false;

            if left == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Writes header + fragment and flushes the sink.
    ///
    /// The block offset advances even when the sink fails: the bytes were
    /// already handed over, so accounting must assume they landed.
    fn emit_physical_record(&mut self, ty: RecordType, fragment: &[u8]) -> Result<(), WalError> {
        debug_assert!(fragment.len() <= 0xffff);
        debug_assert!(self.block_offset + HEADER_SIZE + fragment.len() <= BLOCK_SIZE);

        let crc = mask_crc(record_crc(ty, fragment));

        let mut header = [0u8; HEADER_SIZE];
        LittleEndian::write_u32(&mut header[0..4], crc);
        LittleEndian::write_u16(&mut header[4..6], fragment.len() as u16);
        header[6] = ty.to_byte();

        let result = self
            .sink
            .append(&header)
            .and_then(|()| self.sink.append(fragment))
            .and_then(|()| self.sink.flush());

        self.block_offset += HEADER_SIZE + fragment.len();
        result.map_err(WalError::Io)
    }

    /// Current offset within the active block (for inspection and tests).
    #[must_use]
    pub fn block_offset(&self) -> usize {
        self.block_offset
    }

    /// Consumes the writer and returns the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }
}
