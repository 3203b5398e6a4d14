//! End-to-end recovery tests: version edits framed as log records, written
//! through the real file-backed writer and replayed through the reader,
//! the way the engine persists and recovers its table metadata.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::path::Path;

use manifest::{InternalKey, ValueType, VersionEdit};
use tempfile::tempdir;
use wal::{LogReader, LogWriter, WalError, BLOCK_SIZE};

fn ikey(user_key: &[u8], seq: u64) -> InternalKey {
    InternalKey::new(user_key, seq, ValueType::Value)
}

fn append_edit(writer: &mut LogWriter<impl wal::RecordSink>, edit: &VersionEdit) {
    writer.add_record(&edit.encode()).unwrap();
}

/// Replays a manifest file into (files per level, last log number).
fn replay(path: &Path) -> (BTreeMap<u32, BTreeSet<u64>>, Option<u64>) {
    let mut reader = LogReader::open(path).unwrap();
    let mut levels: BTreeMap<u32, BTreeSet<u64>> = BTreeMap::new();
    let mut log_number = None;

    while let Some(record) = reader.read_record().unwrap() {
        let edit = VersionEdit::decode_from(&record).unwrap();
        if edit.log_number.is_some() {
            log_number = edit.log_number;
        }
        for &(level, number) in &edit.deleted_files {
            levels.entry(level).or_default().remove(&number);
        }
        for (level, file) in &edit.new_files {
            levels.entry(*level).or_default().insert(file.number);
        }
    }
    (levels, log_number)
}

#[test]
fn replay_rebuilds_file_set() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("MANIFEST-000001");

    let mut writer = LogWriter::open(&path).unwrap();

    // Flush: new L0 table.
    let mut edit = VersionEdit::new();
    edit.set_log_number(2);
    edit.set_next_file_number(4);
    edit.add_file(0, 3, 2048, ikey(b"apple", 1), ikey(b"melon", 90));
    append_edit(&mut writer, &edit);

    // Another flush.
    let mut edit = VersionEdit::new();
    edit.set_log_number(5);
    edit.set_next_file_number(7);
    edit.add_file(0, 6, 1024, ikey(b"cherry", 91), ikey(b"pear", 130));
    append_edit(&mut writer, &edit);

    // Compaction: both L0 tables replaced by one L1 table.
    let mut edit = VersionEdit::new();
    edit.set_next_file_number(9);
    edit.remove_file(0, 3);
    edit.remove_file(0, 6);
    edit.add_file(1, 8, 3072, ikey(b"apple", 1), ikey(b"pear", 130));
    append_edit(&mut writer, &edit);
    drop(writer);

    let (levels, log_number) = replay(&path);
    assert!(levels[&0].is_empty());
    assert_eq!(levels[&1], BTreeSet::from([8]));
    assert_eq!(log_number, Some(5));
}

#[test]
fn reopened_writer_appends_after_existing_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("MANIFEST-000001");

    {
        let mut writer = LogWriter::open(&path).unwrap();
        let mut edit = VersionEdit::new();
        edit.add_file(0, 3, 100, ikey(b"a", 1), ikey(b"b", 2));
        append_edit(&mut writer, &edit);
    }
    {
        let mut writer = LogWriter::open(&path).unwrap();
        let mut edit = VersionEdit::new();
        edit.add_file(0, 4, 100, ikey(b"c", 3), ikey(b"d", 4));
        append_edit(&mut writer, &edit);
    }

    let (levels, _) = replay(&path);
    assert_eq!(levels[&0], BTreeSet::from([3, 4]));
}

#[test]
fn torn_tail_keeps_complete_edits() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("MANIFEST-000001");

    {
        let mut writer = LogWriter::open(&path).unwrap();
        let mut edit = VersionEdit::new();
        edit.add_file(0, 3, 100, ikey(b"a", 1), ikey(b"b", 2));
        append_edit(&mut writer, &edit);
        let mut edit = VersionEdit::new();
        edit.set_comparator_name("bytewise");
        edit.add_file(0, 4, 100, ikey(b"c", 3), ikey(b"d", 4));
        append_edit(&mut writer, &edit);
    }

    // A crash mid-append leaves the last record cut off.
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    let len = file.metadata().unwrap().len();
    file.set_len(len - 5).unwrap();
    drop(file);

    let (levels, _) = replay(&path);
    assert_eq!(levels[&0], BTreeSet::from([3]));
}

#[test]
fn corrupted_record_surfaces_during_replay() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("MANIFEST-000001");

    {
        let mut writer = LogWriter::open(&path).unwrap();
        let mut edit = VersionEdit::new();
        edit.add_file(0, 3, 100, ikey(b"a", 1), ikey(b"b", 2));
        append_edit(&mut writer, &edit);
    }

    // Flip a payload byte; the CRC must catch it.
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[10] ^= 0x40;
    std::fs::write(&path, &bytes).unwrap();

    let mut reader = LogReader::open(&path).unwrap();
    assert!(matches!(reader.read_record(), Err(WalError::Corrupt(_))));
}

#[test]
fn edits_larger_than_a_block_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("MANIFEST-000001");

    // Enough new-file entries to push the encoded edit past one block.
    let mut edit = VersionEdit::new();
    let wide_key = vec![b'k'; 256];
    for number in 0..200u64 {
        edit.add_file(
            1,
            number,
            4096,
            InternalKey::new(wide_key.clone(), number * 2 + 1, ValueType::Value),
            InternalKey::new(wide_key.clone(), number * 2 + 2, ValueType::Value),
        );
    }
    assert!(edit.encode().len() > BLOCK_SIZE);

    {
        let mut writer = LogWriter::open(&path).unwrap();
        append_edit(&mut writer, &edit);
    }

    let mut reader = LogReader::open(&path).unwrap();
    let record = reader.read_record().unwrap().unwrap();
    assert_eq!(VersionEdit::decode_from(&record).unwrap(), edit);
    assert!(reader.read_record().unwrap().is_none());
}

#[test]
fn table_filters_skip_absent_keys() {
    use bloom::BloomPolicy;
    use filterblock::{FilterBlockBuilder, FilterBlockReader};

    // Table keys grouped into 4 KiB data blocks, the way a table writer
    // feeds the filter builder.
    let policy = BloomPolicy::new(10);
    let mut builder = FilterBlockBuilder::new(&policy);
    for block in 0u64..8 {
        builder.start_block(block * 4096);
        for i in 0..100u64 {
            builder.add_key(format!("key{}", block * 100 + i).as_bytes());
        }
    }
    let block = builder.finish();

    let reader = FilterBlockReader::new(&policy, &block);
    assert!(reader.key_may_match(0, b"key0"));
    assert!(reader.key_may_match(7 * 4096, b"key799"));
    // Keys from another block's range miss.
    assert!(!reader.key_may_match(0, b"key750"));
}
