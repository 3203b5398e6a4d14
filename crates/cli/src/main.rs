//! # CLI - log inspection tool
//!
//! Dumps the logical contents of the engine's log files to stdout. Both
//! file kinds share the same block-based framing; the manifest's records
//! additionally decode as version edits.
//!
//! ## Usage
//!
//! ```text
//! cli wal <file>        Print each logical record's size and a byte preview
//! cli manifest <file>   Decode and print each version edit
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli -- manifest MANIFEST-000002
//! #0 VersionEdit {
//!   Comparator: bytewise
//! }
//! #1 VersionEdit {
//!   LogNumber: 3
//!   NextFile: 4
//!   LastSeq: 127
//!   AddFile: 0 3 2271 "apple" @ 1 : 1 .. "melon" @ 124 : 1
//! }
//! 2 records
//! ```
//!
//! A corrupt record stops the dump with an error naming what failed; the
//! records printed before it are intact.

use std::fmt::Write as _;

use anyhow::{bail, Context, Result};
use manifest::VersionEdit;
use wal::LogReader;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [kind, path] if kind == "wal" => dump_wal(path),
        [kind, path] if kind == "manifest" => dump_manifest(path),
        _ => bail!("usage: cli <wal|manifest> <file>"),
    }
}

/// Prints every logical record's length and a short byte preview.
fn dump_wal(path: &str) -> Result<()> {
    let mut reader = LogReader::open(path).with_context(|| format!("open {path}"))?;
    let mut count = 0usize;
    for record in reader.records() {
        let record = record.with_context(|| format!("record #{count}"))?;
        println!("#{count} {} bytes  {}", record.len(), preview(&record));
        count += 1;
    }
    println!("{count} records");
    Ok(())
}

/// Decodes every record as a version edit and prints it.
fn dump_manifest(path: &str) -> Result<()> {
    let mut reader = LogReader::open(path).with_context(|| format!("open {path}"))?;
    let mut count = 0usize;
    for record in reader.records() {
        let record = record.with_context(|| format!("record #{count}"))?;
        let edit = VersionEdit::decode_from(&record).with_context(|| format!("edit #{count}"))?;
        println!("#{count} {edit}");
        count += 1;
    }
    println!("{count} records");
    Ok(())
}

/// First bytes of `data` as hex, elided past 16 bytes.
fn preview(data: &[u8]) -> String {
    let mut out = String::new();
    for byte in data.iter().take(16) {
        let _ = write!(out, "{byte:02x}");
    }
    if data.len() > 16 {
        out.push_str("..");
    }
    out
}
