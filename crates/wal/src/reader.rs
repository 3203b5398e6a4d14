use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use crate::format::{record_crc, unmask_crc, RecordType, BLOCK_SIZE, HEADER_SIZE};
use crate::WalError;

/// Reads back the logical records produced by [`LogWriter`](crate::LogWriter).
///
/// The reader consumes the file one 32 KiB block at a time, parses the
/// 7-byte headers, verifies each fragment's masked CRC, and reassembles
/// `First`/`Middle`/`Last` chains into whole records.
///
/// A truncated tail — a header or fragment cut off at end of file, as left
/// behind by a crash mid-write — is treated as a clean end of the log; all
/// complete records before it are still returned. Anything else that does
/// not parse (CRC mismatch, reserved type byte, a length that runs past the
/// block) is reported as [`WalError::Corrupt`].
pub struct LogReader<R: Read> {
    src: R,
    /// Current block, refilled whole.
    buffer: Vec<u8>,
    /// Parse position within `buffer`.
    buffer_offset: usize,
    /// Valid bytes in `buffer` (short for the final block).
    buffer_len: usize,
    eof: bool,
}

impl LogReader<BufReader<File>> {
    /// Opens a log file for sequential replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::with_capacity(BLOCK_SIZE, file)))
    }
}

impl<R: Read> LogReader<R> {
    /// Wraps any byte source (e.g. an in-memory `Cursor` in tests).
    pub fn new(src: R) -> Self {
        Self {
            src,
            buffer: vec![0u8; BLOCK_SIZE],
            buffer_offset: 0,
            buffer_len: 0,
            eof: false,
        }
    }

    /// Returns the next logical record, or `None` at end of log.
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>, WalError> {
        let mut scratch: Vec<u8> = Vec::new();
        let mut in_fragmented_record = false;

        loop {
            let Some((ty, fragment)) = self.read_physical_record()? else {
                // A dangling First/Middle chain at EOF is a crashed write;
                // drop it like a truncated tail.
                return Ok(None);
            };

            match ty {
                RecordType::Full => {
                    if in_fragmented_record {
                        return Err(WalError::Corrupt(
                            "partial record followed by full record".into(),
                        ));
                    }
                    return Ok(Some(fragment));
                }
                RecordType::First => {
                    if in_fragmented_record {
                        return Err(WalError::Corrupt(
                            "partial record followed by first fragment".into(),
                        ));
                    }
                    scratch = fragment;
                    in_fragmented_record = true;
                }
                RecordType::Middle => {
                    if !in_fragmented_record {
                        return Err(WalError::Corrupt(
                            "middle fragment without preceding first".into(),
                        ));
                    }
                    scratch.extend_from_slice(&fragment);
                }
                RecordType::Last => {
                    if !in_fragmented_record {
                        return Err(WalError::Corrupt(
                            "last fragment without preceding first".into(),
                        ));
                    }
                    scratch.extend_from_slice(&fragment);
                    return Ok(Some(scratch));
                }
            }
        }
    }

    /// Iterator adapter over [`read_record`](LogReader::read_record).
    pub fn records(&mut self) -> Records<'_, R> {
        Records { reader: self }
    }

    /// Parses the next checksummed fragment, refilling the block buffer as
    /// needed. `None` means clean EOF (including a truncated tail).
    fn read_physical_record(&mut self) -> Result<Option<(RecordType, Vec<u8>)>, WalError> {
        loop {
            if self.buffer_offset + HEADER_SIZE > self.buffer_len {
                // Block trailer (or a header cut off at EOF): skip to the
                // next block.
                if !self.fill_buffer()? {
                    return Ok(None);
                }
                continue;
            }

            let header = &self.buffer[self.buffer_offset..self.buffer_offset + HEADER_SIZE];
            let stored_crc = LittleEndian::read_u32(&header[0..4]);
            let length = LittleEndian::read_u16(&header[4..6]) as usize;
            let type_byte = header[6];

            // An all-zero header is what the zero-filled trailer of a block
            // (or a preallocated region) reads back as; it only reaches this
            // point if the file ends inside it.
            if stored_crc == 0 && length == 0 && type_byte == 0 {
                self.buffer_offset = self.buffer_len;
                continue;
            }

            let ty = RecordType::from_byte(type_byte)
                .ok_or_else(|| WalError::Corrupt(format!("reserved record type {type_byte}")))?;

            let data_start = self.buffer_offset + HEADER_SIZE;
            if data_start + length > self.buffer_len {
                if self.eof {
                    // Fragment cut off by a crash; everything before it is
                    // intact.
                    return Ok(None);
                }
                return Err(WalError::Corrupt("record length exceeds block".into()));
            }

            let fragment = &self.buffer[data_start..data_start + length];
            if record_crc(ty, fragment) != unmask_crc(stored_crc) {
                return Err(WalError::Corrupt("record checksum mismatch".into()));
            }

            self.buffer_offset = data_start + length;
            return Ok(Some((ty, fragment.to_vec())));
        }
    }

    /// Reads the next block. Returns `false` at EOF.
    fn fill_buffer(&mut self) -> Result<bool, WalError> {
        if self.eof {
            return Ok(false);
        }

        self.buffer_offset = 0;
        self.buffer_len = 0;
        while self.buffer_len < BLOCK_SIZE {
            let n = self.src.read(&mut self.buffer[self.buffer_len..])?;
            if n == 0 {
                self.eof = true;
                break;
            }
            self.buffer_len += n;
        }
        Ok(self.buffer_len > 0)
    }
}

/// Iterator over the records of a log, yielding errors in place.
pub struct Records<'a, R: Read> {
    reader: &'a mut LogReader<R>,
}

impl<R: Read> Iterator for Records<'_, R> {
    type Item = Result<Vec<u8>, WalError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_record().transpose()
    }
}
