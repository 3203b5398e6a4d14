//! # Filter block — per-table membership filter index
//!
//! A filter block is stored near the end of each sorted-table file. It
//! packs one membership filter (e.g. a Bloom filter) per 2 KiB range of
//! data-block start offsets, so a point lookup can ask "might this key be
//! in the block starting at offset X?" and skip the disk read entirely on
//! a confident no.
//!
//! ## Block layout
//!
//! Filter bit-strings are concatenated into an arena, followed by an index
//! of offsets into it:
//!
//! ```text
//! [filter 0][filter 1]...[filter N-1]
//! [offset of filter 0: u32 LE]...[offset of filter N-1: u32 LE]
//! [offset of the offset array: u32 LE]
//! [base_lg: u8]
//! ```
//!
//! Filter `i` covers data blocks whose start offset lies in
//! `[i << base_lg, (i+1) << base_lg)`. Several small data blocks can share
//! one filter; a range that never saw a key gets an empty filter so the
//! index stays dense.
//!
//! ## Fail-open
//!
//! The reader must never produce a false negative — that would silently
//! lose data. Every ambiguous situation (trailer too short, out-of-range
//! index, nonsensical offsets, an absurd `base_lg`, an empty filter slot)
//! therefore answers "may match", costing at worst a wasted read.

use byteorder::{ByteOrder, LittleEndian};

/// Filter granularity exponent: one filter per `1 << FILTER_BASE_LG` bytes
/// of data-block offset space.
pub const FILTER_BASE_LG: u8 = 11;

/// Region size in bytes covered by a single filter (2 KiB).
pub const FILTER_BASE: u64 = 1 << FILTER_BASE_LG;

/// A pluggable membership-filter algorithm.
///
/// The filter block stores and routes filter bytes; what those bytes mean
/// is entirely the policy's business. The same policy (by `name`) must be
/// used when writing and reading a table.
pub trait FilterPolicy {
    /// Identifies the policy; persisted table metadata can use it to
    /// detect a policy mismatch on open.
    fn name(&self) -> &'static str;

    /// Appends a filter summarizing `keys` to `dst`.
    ///
    /// Must append — `dst` already holds earlier filters for the same
    /// table.
    fn create_filter(&self, keys: &[&[u8]], dst: &mut Vec<u8>);

    /// True if `key` may be in the set `filter` was built from. False
    /// positives are allowed; false negatives are not.
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool;
}

/// Accumulates the filters for one table while it is written.
///
/// Call sequence: `(start_block add_key*)* finish`, with `start_block`
/// offsets non-decreasing (data blocks are written in file order).
pub struct FilterBlockBuilder<'a> {
    policy: &'a dyn FilterPolicy,
    /// Flattened contents of the keys pending in the current filter.
    keys: Vec<u8>,
    /// Start of each pending key within `keys`.
    starts: Vec<usize>,
    /// Filter arena built so far.
    result: Vec<u8>,
    /// Start of each generated filter within `result`.
    filter_offsets: Vec<u32>,
}

impl<'a> FilterBlockBuilder<'a> {
    pub fn new(policy: &'a dyn FilterPolicy) -> Self {
        Self {
            policy,
            keys: Vec::new(),
            starts: Vec::new(),
            result: Vec::new(),
            filter_offsets: Vec::new(),
        }
    }

    /// Announces that a data block begins at `block_offset`.
    ///
    /// Generates filters until every range before `block_offset`'s has
    /// one, so keys added from here on land in the right filter. Ranges
    /// skipped over (no data block started in them) get empty filters.
    pub fn start_block(&mut self, block_offset: u64) {
        let filter_index = (block_offset >> FILTER_BASE_LG) as usize;
        debug_assert!(filter_index >= self.filter_offsets.len());
        while self.filter_offsets.len() < filter_index {
            self.generate_filter();
        }
    }

    /// Buffers `key` for the filter of the current range. Keys are only
    /// hashed when the filter is generated.
    pub fn add_key(&mut self, key: &[u8]) {
        self.starts.push(self.keys.len());
        self.keys.extend_from_slice(key);
    }

    /// Flushes the pending filter and appends the offset index, returning
    /// the finished block.
    pub fn finish(mut self) -> Vec<u8> {
        if !self.starts.is_empty() {
            self.generate_filter();
        }

        let array_start = self.result.len() as u32;
        let mut buf = [0u8; 4];
        for &offset in &self.filter_offsets {
            LittleEndian::write_u32(&mut buf, offset);
            self.result.extend_from_slice(&buf);
        }
        LittleEndian::write_u32(&mut buf, array_start);
        self.result.extend_from_slice(&buf);
        self.result.push(FILTER_BASE_LG);
        self.result
    }

    fn generate_filter(&mut self) {
        let num_keys = self.starts.len();
        self.filter_offsets.push(self.result.len() as u32);
        if num_keys == 0 {
            // Range with no keys: record an empty filter.
            return;
        }

        // Sentinel so the last key's extent is computable.
        self.starts.push(self.keys.len());
        let tmp_keys: Vec<&[u8]> = (0..num_keys)
            .map(|i| &self.keys[self.starts[i]..self.starts[i + 1]])
            .collect();
        self.policy.create_filter(&tmp_keys, &mut self.result);

        self.keys.clear();
        self.starts.clear();
    }
}

/// Answers membership queries over a finished filter block.
///
/// Construction parses the trailer; a malformed block disables filtering
/// (every query answers "may match") rather than erroring. The reader
/// holds only shared references and is safe to use from many threads.
pub struct FilterBlockReader<'a> {
    policy: &'a dyn FilterPolicy,
    /// Filter arena (up to the start of the offset array).
    data: &'a [u8],
    /// The offset array: `num` little-endian u32 entries.
    offsets: &'a [u8],
    num: usize,
    base_lg: u8,
}

impl<'a> FilterBlockReader<'a> {
    pub fn new(policy: &'a dyn FilterPolicy, contents: &'a [u8]) -> Self {
        // Unusable until the trailer proves otherwise.
        let mut reader = Self {
            policy,
            data: &[],
            offsets: &[],
            num: 0,
            base_lg: 0,
        };

        // Trailer: 4-byte array start + 1-byte base_lg.
        if contents.len() < 5 {
            return reader;
        }
        let base_lg = contents[contents.len() - 1];
        // No sane block uses ranges wider than 2^30 bytes; larger values
        // (up to the u64 shift width) come from corruption.
        if base_lg > 30 {
            return reader;
        }
        let array_start = LittleEndian::read_u32(&contents[contents.len() - 5..]) as usize;
        if array_start > contents.len() - 5 {
            return reader;
        }

        reader.base_lg = base_lg;
        reader.data = &contents[..array_start];
        reader.offsets = &contents[array_start..contents.len() - 5];
        reader.num = reader.offsets.len() / 4;
        reader
    }

    /// True if a key may be present in the data block starting at
    /// `block_offset`. False only when the filter for that block's range
    /// definitely excludes `key`.
    #[must_use]
    pub fn key_may_match(&self, block_offset: u64, key: &[u8]) -> bool {
        let index = (block_offset >> self.base_lg) as usize;
        if index >= self.num {
            // No filter recorded for this range (or the block was
            // unusable, num == 0): fail open.
            return true;
        }

        let start = LittleEndian::read_u32(&self.offsets[index * 4..]) as usize;
        let limit = if index + 1 < self.num {
            LittleEndian::read_u32(&self.offsets[(index + 1) * 4..]) as usize
        } else {
            self.data.len()
        };

        if start > limit || limit > self.data.len() {
            // Nonsensical index entry: treat as a potential match.
            return true;
        }
        if start == limit {
            // Empty slot — no filter was recorded for this range.
            return true;
        }
        self.policy.key_may_match(key, &self.data[start..limit])
    }

    /// Number of filters in the block.
    #[must_use]
    pub fn num_filters(&self) -> usize {
        self.num
    }
}
