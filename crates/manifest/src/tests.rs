use super::coding::{get_length_prefixed, get_varint64, put_length_prefixed, put_varint64};
use super::*;

// -------------------- Helpers --------------------

fn key(user_key: &[u8], seq: u64) -> InternalKey {
    InternalKey::new(user_key, seq, ValueType::Value)
}

fn roundtrip(edit: &VersionEdit) -> VersionEdit {
    VersionEdit::decode_from(&edit.encode()).unwrap()
}

// -------------------- Varint coding --------------------

#[test]
fn varint_roundtrip_edges() {
    let values = [0u64, 1, 127, 128, 255, 16383, 16384, 1 << 32, u64::MAX];
    for &v in &values {
        let mut buf = Vec::new();
        put_varint64(&mut buf, v);
        let mut input = buf.as_slice();
        assert_eq!(get_varint64(&mut input), Some(v));
        assert!(input.is_empty());
    }
}

#[test]
fn varint_truncated_is_none() {
    let mut buf = Vec::new();
    put_varint64(&mut buf, 300);
    let mut input = &buf[..1]; // continuation bit set, second byte missing
    assert_eq!(get_varint64(&mut input), None);

    let mut empty: &[u8] = &[];
    assert_eq!(get_varint64(&mut empty), None);
}

#[test]
fn varint_overflow_is_none() {
    // Eleven continuation bytes: wider than any u64.
    let buf = [0xffu8; 11];
    let mut input = buf.as_slice();
    assert_eq!(get_varint64(&mut input), None);
}

#[test]
fn length_prefixed_roundtrip_and_truncation() {
    let mut buf = Vec::new();
    put_length_prefixed(&mut buf, b"hello");
    put_length_prefixed(&mut buf, b"");

    let mut input = buf.as_slice();
    assert_eq!(get_length_prefixed(&mut input), Some(&b"hello"[..]));
    assert_eq!(get_length_prefixed(&mut input), Some(&b""[..]));
    assert!(input.is_empty());

    // Declared length longer than the remaining input.
    let mut short = &buf[..3];
    assert_eq!(get_length_prefixed(&mut short), None);
}

// -------------------- Internal keys --------------------

#[test]
fn internal_key_roundtrip() {
    for k in [
        key(b"", 0),
        key(b"user-key", 42),
        InternalKey::new(b"tomb".to_vec(), 7, ValueType::Deletion),
        key(b"max", InternalKey::MAX_SEQUENCE),
    ] {
        assert_eq!(InternalKey::decode(&k.encode()), Some(k));
    }
}

#[test]
fn internal_key_trailer_layout() {
    let k = InternalKey::new(b"ab", 0x0102, ValueType::Value);
    let encoded = k.encode();
    assert_eq!(&encoded[..2], b"ab");
    // (seq << 8) | type, little-endian.
    assert_eq!(&encoded[2..], &((0x0102u64 << 8) | 1).to_le_bytes());
}

#[test]
fn internal_key_decode_rejects_garbage() {
    assert_eq!(InternalKey::decode(b"short"), None);
    // 8-byte trailer with an unknown type byte.
    let mut encoded = key(b"k", 5).encode();
    let trailer_start = encoded.len() - 8;
    encoded[trailer_start] = 0x77;
    assert_eq!(InternalKey::decode(&encoded), None);
}

#[test]
fn internal_key_ordering() {
    // User key ascending dominates.
    assert!(key(b"a", 1) < key(b"b", 100));
    // Same user key: higher sequence sorts first (newest first).
    assert!(key(b"a", 100) < key(b"a", 1));
    // Same user key and sequence: Value (1) sorts before Deletion (0).
    assert!(
        InternalKey::new(b"a".to_vec(), 5, ValueType::Value)
            < InternalKey::new(b"a".to_vec(), 5, ValueType::Deletion)
    );
}

// -------------------- VersionEdit round trips --------------------

#[test]
fn empty_edit_encodes_to_nothing() {
    let edit = VersionEdit::new();
    assert!(edit.encode().is_empty());
    assert!(roundtrip(&edit).is_empty());
}

#[test]
fn full_edit_roundtrip() {
    let mut edit = VersionEdit::new();
    edit.set_comparator_name("bytewise");
    edit.set_log_number(10);
    edit.set_prev_log_number(9);
    edit.set_next_file_number(100);
    edit.set_last_sequence(5000);
    edit.set_compact_pointer(1, key(b"cursor", 50));
    edit.remove_file(0, 1);
    edit.remove_file(0, 2);
    edit.add_file(0, 3, 2048, key(b"a", 1), key(b"m", 90));
    edit.add_file(1, 4, 4096, key(b"n", 10), key(b"z", 200));

    // Field-for-field equality, including presence flags.
    assert_eq!(roundtrip(&edit), edit);
}

#[test]
fn partial_edits_keep_unset_fields_unset() {
    // Every subset of scalar fields must round-trip without inventing
    // values for the absent ones.
    for mask in 0u32..32 {
        let mut edit = VersionEdit::new();
        if mask & 1 != 0 {
            edit.set_comparator_name("cmp");
        }
        if mask & 2 != 0 {
            edit.set_log_number(7);
        }
        if mask & 4 != 0 {
            edit.set_prev_log_number(6);
        }
        if mask & 8 != 0 {
            edit.set_next_file_number(8);
        }
        if mask & 16 != 0 {
            edit.set_last_sequence(9);
        }
        let decoded = roundtrip(&edit);
        assert_eq!(decoded, edit, "mask {:#b}", mask);
        assert_eq!(decoded.log_number.is_some(), mask & 2 != 0);
        assert_eq!(decoded.last_sequence.is_some(), mask & 16 != 0);
    }
}

#[test]
fn deleted_files_collapse_duplicates() {
    let mut edit = VersionEdit::new();
    edit.remove_file(2, 17);
    edit.remove_file(2, 17);
    assert_eq!(edit.deleted_files.len(), 1);

    // Duplicates on the wire collapse too.
    let mut doubled = edit.encode();
    doubled.extend_from_slice(&edit.encode());
    let decoded = VersionEdit::decode_from(&doubled).unwrap();
    assert_eq!(decoded.deleted_files.len(), 1);
    assert!(decoded.deleted_files.contains(&(2, 17)));
}

#[test]
fn compact_pointers_preserve_insertion_order() {
    // Two cursors for the same level: both survive decode, in append
    // order. Folding last-wins is the consumer's policy, not the codec's.
    let mut edit = VersionEdit::new();
    edit.set_compact_pointer(3, key(b"older", 1));
    edit.set_compact_pointer(3, key(b"newer", 2));

    let decoded = roundtrip(&edit);
    assert_eq!(decoded.compact_pointers.len(), 2);
    assert_eq!(decoded.compact_pointers[0].1.user_key(), b"older");
    assert_eq!(decoded.compact_pointers[1].1.user_key(), b"newer");
}

#[test]
fn new_files_preserve_order_and_metadata() {
    let mut edit = VersionEdit::new();
    edit.add_file(0, 11, 100, key(b"a", 1), key(b"c", 3));
    edit.add_file(0, 12, 200, key(b"d", 4), key(b"f", 6));

    let decoded = roundtrip(&edit);
    assert_eq!(decoded.new_files.len(), 2);
    assert_eq!(decoded.new_files[0].1.number, 11);
    assert_eq!(decoded.new_files[1].1.number, 12);
    assert_eq!(decoded.new_files[1].1.smallest.user_key(), b"d");
}

#[test]
fn clear_resets_everything() {
    let mut edit = VersionEdit::new();
    edit.set_log_number(1);
    edit.add_file(0, 2, 3, key(b"a", 1), key(b"b", 2));
    edit.clear();
    assert!(edit.is_empty());
}

// -------------------- FileMetaData --------------------

#[test]
fn file_metadata_runtime_fields_default_and_compare_equal() {
    let f = FileMetaData::new(5, 1024, key(b"a", 1), key(b"z", 9));
    assert_eq!(f.refs, 0);
    assert_eq!(f.allowed_seeks, 1 << 30);

    // Runtime bookkeeping does not affect equality.
    let mut g = f.clone();
    g.refs = 3;
    g.allowed_seeks = 12;
    assert_eq!(f, g);
}

// -------------------- Corruption --------------------

#[test]
fn unknown_tag_is_corruption() {
    // Tag 8 is retired and must be rejected.
    let mut buf = Vec::new();
    put_varint64(&mut buf, 8);
    let err = VersionEdit::decode_from(&buf).unwrap_err();
    assert!(err.to_string().contains("unknown tag 8"));

    let mut buf = Vec::new();
    put_varint64(&mut buf, 200);
    assert!(VersionEdit::decode_from(&buf).is_err());
}

#[test]
fn truncated_input_is_corruption_never_panic() {
    let mut edit = VersionEdit::new();
    edit.set_comparator_name("bytewise");
    edit.set_log_number(10_000); // multi-byte varint
    edit.set_compact_pointer(1, key(b"cursor", 50));
    edit.add_file(2, 3, 4096, key(b"a", 1), key(b"z", 2));
    let encoded = edit.encode();

    // Whatever prefix we cut, decode must return cleanly. Most prefixes
    // are corrupt; prefixes ending exactly on a field boundary are fine.
    for cut in 0..encoded.len() {
        let _ = VersionEdit::decode_from(&encoded[..cut]);
    }

    // A cut inside the comparator string is definitely corrupt.
    let err = VersionEdit::decode_from(&encoded[..3]).unwrap_err();
    assert!(err.to_string().contains("comparator name"));
}

#[test]
fn bad_level_is_corruption() {
    let mut buf = Vec::new();
    put_varint64(&mut buf, 6); // DeletedFile tag
    put_varint64(&mut buf, u64::from(NUM_LEVELS)); // first invalid level
    put_varint64(&mut buf, 1);
    let err = VersionEdit::decode_from(&buf).unwrap_err();
    assert!(err.to_string().contains("deleted file"));
}

#[test]
fn malformed_internal_key_is_corruption() {
    let mut buf = Vec::new();
    put_varint64(&mut buf, 5); // CompactPointer tag
    put_varint64(&mut buf, 0);
    put_length_prefixed(&mut buf, b"tiny"); // shorter than the 8-byte trailer
    let err = VersionEdit::decode_from(&buf).unwrap_err();
    assert!(err.to_string().contains("compaction pointer"));
}

#[test]
fn invalid_utf8_comparator_is_corruption() {
    let mut buf = Vec::new();
    put_varint64(&mut buf, 1); // Comparator tag
    put_length_prefixed(&mut buf, &[0xff, 0xfe]);
    let err = VersionEdit::decode_from(&buf).unwrap_err();
    assert!(err.to_string().contains("comparator name"));
}

#[test]
fn display_names_the_set_fields() {
    let mut edit = VersionEdit::new();
    edit.set_log_number(12);
    edit.add_file(1, 9, 512, key(b"a", 1), key(b"b", 2));
    let text = edit.to_string();
    assert!(text.contains("LogNumber: 12"));
    assert!(text.contains("AddFile: 1 9 512"));
}
