use std::collections::BTreeSet;
use std::fmt;

use crate::coding::{get_length_prefixed, get_varint64, put_length_prefixed, put_varint64};
use crate::key::InternalKey;
use crate::ManifestError;

/// Number of levels the tree is allowed to have. Level fields outside this
/// range fail decoding as corruption.
pub const NUM_LEVELS: u32 = 7;

/// Field tags of the version-edit wire format.
///
/// Tag values are fixed by the on-disk format; 8 belonged to a long-dead
/// field and is never written or accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Tag {
    Comparator = 1,
    LogNumber = 2,
    NextFileNumber = 3,
    LastSequence = 4,
    CompactPointer = 5,
    DeletedFile = 6,
    NewFile = 7,
    PrevLogNumber = 9,
}

impl Tag {
    fn from_u64(v: u64) -> Option<Self> {
        match v {
            1 => Some(Tag::Comparator),
            2 => Some(Tag::LogNumber),
            3 => Some(Tag::NextFileNumber),
            4 => Some(Tag::LastSequence),
            5 => Some(Tag::CompactPointer),
            6 => Some(Tag::DeletedFile),
            7 => Some(Tag::NewFile),
            9 => Some(Tag::PrevLogNumber),
            _ => None,
        }
    }

    fn put(self, dst: &mut Vec<u8>) {
        put_varint64(dst, self as u64);
    }
}

/// Metadata for one sorted-table file.
///
/// Only `number`, `file_size`, `smallest` and `largest` are persisted (with
/// the level, alongside the entry). `refs` and `allowed_seeks` are runtime
/// bookkeeping owned by the version manager and reset on decode.
#[derive(Debug, Clone)]
pub struct FileMetaData {
    /// Unique file identifier within the database.
    pub number: u64,
    /// File size in bytes.
    pub file_size: u64,
    /// Smallest internal key served by the table (inclusive).
    pub smallest: InternalKey,
    /// Largest internal key served by the table (inclusive).
    pub largest: InternalKey,
    /// Live-version reference count. Runtime-only.
    pub refs: u32,
    /// Seek misses tolerated before the file is scheduled for compaction.
    /// Runtime-only.
    pub allowed_seeks: u64,
}

impl FileMetaData {
    /// Seek budget a freshly loaded file starts with.
    const DEFAULT_ALLOWED_SEEKS: u64 = 1 << 30;

    pub fn new(number: u64, file_size: u64, smallest: InternalKey, largest: InternalKey) -> Self {
        Self {
            number,
            file_size,
            smallest,
            largest,
            refs: 0,
            allowed_seeks: Self::DEFAULT_ALLOWED_SEEKS,
        }
    }
}

/// Equality covers the persisted fields only; `refs` and `allowed_seeks`
/// are transient state that does not survive an encode/decode trip.
impl PartialEq for FileMetaData {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
            && self.file_size == other.file_size
            && self.smallest == other.smallest
            && self.largest == other.largest
    }
}

impl Eq for FileMetaData {}

/// An atomic batch of metadata changes, serialized as one manifest record.
///
/// An edit accumulates optional scalar updates and repeated entries, is
/// encoded once, appended to the manifest log, and discarded. On recovery
/// the manifest's edits are decoded in order and folded into the live
/// version state. Scalars left unset stay `None` after decode — absence is
/// meaningful and must not be read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionEdit {
    /// Name of the comparator the database was created with.
    pub comparator: Option<String>,
    /// WAL file number the recovered state is current up to.
    pub log_number: Option<u64>,
    /// WAL file number of the previous (being-compacted) log.
    pub prev_log_number: Option<u64>,
    /// Next file number to allocate.
    pub next_file_number: Option<u64>,
    /// Highest sequence number used.
    pub last_sequence: Option<u64>,
    /// Per-level compaction cursors, in insertion order. Later entries for
    /// a level supersede earlier ones; folding last-wins is the consumer's
    /// job, the codec preserves the order as written.
    pub compact_pointers: Vec<(u32, InternalKey)>,
    /// Files removed from a level: `(level, file_number)`. Set semantics —
    /// duplicates collapse.
    pub deleted_files: BTreeSet<(u32, u64)>,
    /// Files added to a level, in insertion order.
    pub new_files: Vec<(u32, FileMetaData)>,
}

impl VersionEdit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the edit to the freshly-constructed state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn set_comparator_name(&mut self, name: impl Into<String>) {
        self.comparator = Some(name.into());
    }

    pub fn set_log_number(&mut self, num: u64) {
        self.log_number = Some(num);
    }

    pub fn set_prev_log_number(&mut self, num: u64) {
        self.prev_log_number = Some(num);
    }

    pub fn set_next_file_number(&mut self, num: u64) {
        self.next_file_number = Some(num);
    }

    pub fn set_last_sequence(&mut self, seq: u64) {
        self.last_sequence = Some(seq);
    }

    /// Records where the next compaction at `level` should resume.
    pub fn set_compact_pointer(&mut self, level: u32, key: InternalKey) {
        self.compact_pointers.push((level, key));
    }

    /// Adds a table file at `level` covering `[smallest, largest]`.
    pub fn add_file(
        &mut self,
        level: u32,
        number: u64,
        file_size: u64,
        smallest: InternalKey,
        largest: InternalKey,
    ) {
        self.new_files
            .push((level, FileMetaData::new(number, file_size, smallest, largest)));
    }

    /// Marks the table file `number` at `level` as deleted.
    pub fn remove_file(&mut self, level: u32, number: u64) {
        self.deleted_files.insert((level, number));
    }

    /// True if no field has been set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Appends the wire encoding to `dst`. Total — encoding cannot fail.
    ///
    /// Each present field is written as a varint tag followed by its body;
    /// repeated fields are written once per entry with no count, so the
    /// decoder just loops until the input runs out.
    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        if let Some(ref name) = self.comparator {
            Tag::Comparator.put(dst);
            put_length_prefixed(dst, name.as_bytes());
        }
        if let Some(num) = self.log_number {
            Tag::LogNumber.put(dst);
            put_varint64(dst, num);
        }
        if let Some(num) = self.prev_log_number {
            Tag::PrevLogNumber.put(dst);
            put_varint64(dst, num);
        }
        if let Some(num) = self.next_file_number {
            Tag::NextFileNumber.put(dst);
            put_varint64(dst, num);
        }
        if let Some(seq) = self.last_sequence {
            Tag::LastSequence.put(dst);
            put_varint64(dst, seq);
        }

        for (level, key) in &self.compact_pointers {
            Tag::CompactPointer.put(dst);
            put_varint64(dst, u64::from(*level));
            put_length_prefixed(dst, &key.encode());
        }

        for &(level, number) in &self.deleted_files {
            Tag::DeletedFile.put(dst);
            put_varint64(dst, u64::from(level));
            put_varint64(dst, number);
        }

        for (level, f) in &self.new_files {
            Tag::NewFile.put(dst);
            put_varint64(dst, u64::from(*level));
            put_varint64(dst, f.number);
            put_varint64(dst, f.file_size);
            put_length_prefixed(dst, &f.smallest.encode());
            put_length_prefixed(dst, &f.largest.encode());
        }
    }

    /// The wire encoding as a fresh buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut dst = Vec::with_capacity(128);
        self.encode_to(&mut dst);
        dst
    }

    /// Decodes an edit from `src`, consuming all of it.
    ///
    /// All-or-nothing: any unknown tag, truncated varint or string, bad
    /// level, or malformed key aborts with a corruption error naming the
    /// field, and the partial edit is discarded.
    pub fn decode_from(src: &[u8]) -> Result<Self, ManifestError> {
        let corrupt = |field: &str| ManifestError::Corrupt(field.to_string());

        let mut edit = VersionEdit::new();
        let mut input = src;

        while !input.is_empty() {
            let tag_value = get_varint64(&mut input).ok_or_else(|| corrupt("field tag"))?;
            let tag = Tag::from_u64(tag_value)
                .ok_or_else(|| ManifestError::Corrupt(format!("unknown tag {tag_value}")))?;

            match tag {
                Tag::Comparator => {
                    let name =
                        get_length_prefixed(&mut input).ok_or_else(|| corrupt("comparator name"))?;
                    let name = std::str::from_utf8(name)
                        .map_err(|_| corrupt("comparator name"))?;
                    edit.comparator = Some(name.to_string());
                }
                Tag::LogNumber => {
                    edit.log_number =
                        Some(get_varint64(&mut input).ok_or_else(|| corrupt("log number"))?);
                }
                Tag::PrevLogNumber => {
                    edit.prev_log_number = Some(
                        get_varint64(&mut input).ok_or_else(|| corrupt("previous log number"))?,
                    );
                }
                Tag::NextFileNumber => {
                    edit.next_file_number =
                        Some(get_varint64(&mut input).ok_or_else(|| corrupt("next file number"))?);
                }
                Tag::LastSequence => {
                    edit.last_sequence = Some(
                        get_varint64(&mut input).ok_or_else(|| corrupt("last sequence number"))?,
                    );
                }
                Tag::CompactPointer => {
                    let level = get_level(&mut input).ok_or_else(|| corrupt("compaction pointer"))?;
                    let key = get_internal_key(&mut input)
                        .ok_or_else(|| corrupt("compaction pointer"))?;
                    edit.compact_pointers.push((level, key));
                }
                Tag::DeletedFile => {
                    let level = get_level(&mut input).ok_or_else(|| corrupt("deleted file"))?;
                    let number =
                        get_varint64(&mut input).ok_or_else(|| corrupt("deleted file"))?;
                    edit.deleted_files.insert((level, number));
                }
                Tag::NewFile => {
                    let level = get_level(&mut input).ok_or_else(|| corrupt("new-file entry"))?;
                    let number =
                        get_varint64(&mut input).ok_or_else(|| corrupt("new-file entry"))?;
                    let file_size =
                        get_varint64(&mut input).ok_or_else(|| corrupt("new-file entry"))?;
                    let smallest =
                        get_internal_key(&mut input).ok_or_else(|| corrupt("new-file entry"))?;
                    let largest =
                        get_internal_key(&mut input).ok_or_else(|| corrupt("new-file entry"))?;
                    edit.new_files
                        .push((level, FileMetaData::new(number, file_size, smallest, largest)));
                }
            }
        }

        Ok(edit)
    }
}

/// Reads a level number, rejecting values outside `0..NUM_LEVELS`.
fn get_level(input: &mut &[u8]) -> Option<u32> {
    let level = get_varint64(input)?;
    if level >= u64::from(NUM_LEVELS) {
        return None;
    }
    Some(level as u32)
}

/// Reads a length-prefixed internal key.
fn get_internal_key(input: &mut &[u8]) -> Option<InternalKey> {
    InternalKey::decode(get_length_prefixed(input)?)
}

impl fmt::Display for VersionEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "VersionEdit {{")?;
        if let Some(ref name) = self.comparator {
            writeln!(f, "  Comparator: {name}")?;
        }
        if let Some(num) = self.log_number {
            writeln!(f, "  LogNumber: {num}")?;
        }
        if let Some(num) = self.prev_log_number {
            writeln!(f, "  PrevLogNumber: {num}")?;
        }
        if let Some(num) = self.next_file_number {
            writeln!(f, "  NextFile: {num}")?;
        }
        if let Some(seq) = self.last_sequence {
            writeln!(f, "  LastSeq: {seq}")?;
        }
        for (level, key) in &self.compact_pointers {
            writeln!(f, "  CompactPointer: {level} {key}")?;
        }
        for (level, number) in &self.deleted_files {
            writeln!(f, "  RemoveFile: {level} {number}")?;
        }
        for (level, file) in &self.new_files {
            writeln!(
                f,
                "  AddFile: {} {} {} {} .. {}",
                level, file.number, file.file_size, file.smallest, file.largest
            )?;
        }
        write!(f, "}}")
    }
}
