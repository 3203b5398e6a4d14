//! Varint and length-prefixed primitives shared by the edit codec.
//!
//! Getters take `&mut &[u8]` and advance the slice past what they consume;
//! `None` means the input was truncated or malformed, and the caller turns
//! that into a corruption error naming the field it was decoding.

/// Appends `v` as a base-128 varint (7 bits per byte, low first).
pub(crate) fn put_varint64(dst: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        dst.push((v as u8) | 0x80);
        v >>= 7;
    }
    dst.push(v as u8);
}

/// Reads a varint, rejecting truncation and anything wider than 64 bits.
pub(crate) fn get_varint64(input: &mut &[u8]) -> Option<u64> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    while shift < 64 {
        let (&byte, rest) = input.split_first()?;
        *input = rest;
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some(result);
        }
        shift += 7;
    }
    None
}

/// Appends a varint length followed by the bytes themselves.
pub(crate) fn put_length_prefixed(dst: &mut Vec<u8>, data: &[u8]) {
    put_varint64(dst, data.len() as u64);
    dst.extend_from_slice(data);
}

/// Reads a varint length and returns that many bytes.
pub(crate) fn get_length_prefixed<'a>(input: &mut &'a [u8]) -> Option<&'a [u8]> {
    let len = get_varint64(input)? as usize;
    if input.len() < len {
        return None;
    }
    let (data, rest) = input.split_at(len);
    *input = rest;
    Some(data)
}
