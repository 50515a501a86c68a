//! STORE-only ZIP archive writer
//!
//! Builds a complete archive in memory from named byte buffers. Entries are
//! stored verbatim (compression method 0), which keeps the writer free of any
//! compression dependency; screenshots are already compressed rasters anyway.
//!
//! Layout of the produced buffer:
//!
//! ```text
//! [local header | name | content] * N
//! [central directory header | name] * N
//! [end of central directory]
//! ```

mod crc32;
mod header;

pub use crc32::{crc32, Crc32};
pub use header::DosDateTime;

use crate::{Error, Result};
use chrono::NaiveDateTime;
use header::{EntryFields, CENTRAL_HEADER_LEN, EOCD_LEN, FLAG_UTF8, LOCAL_HEADER_LEN};
use log::debug;
use std::collections::HashSet;
use std::path::Path;

/// A named file to place in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub content: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Serializes entries into a STORE-method ZIP archive
///
/// The writer is stateless apart from its timestamp policy, so one instance
/// can be shared freely between threads.
///
/// # Examples
///
/// ```
/// use hihat_capture::{ArchiveEntry, ZipWriter};
///
/// let zip = ZipWriter::new()
///     .build(&[ArchiveEntry::new("hello.txt", "hi")])
///     .unwrap();
/// assert_eq!(&zip[..4], b"PK\x03\x04");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ZipWriter {
    timestamp: Option<NaiveDateTime>,
}

impl ZipWriter {
    /// A writer stamping entries with the wall-clock time of each build
    pub fn new() -> Self {
        Self { timestamp: None }
    }

    /// A writer stamping every entry with a fixed time, for reproducible output
    pub fn with_timestamp(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp: Some(timestamp),
        }
    }

    /// Build the archive for `entries`, preserving their order
    pub fn build(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
        validate_entries(entries)?;

        let modified = match &self.timestamp {
            Some(ts) => DosDateTime::from_datetime(ts),
            None => DosDateTime::now(),
        };

        let payload: usize = entries
            .iter()
            .map(|e| LOCAL_HEADER_LEN + CENTRAL_HEADER_LEN + 2 * e.name.len() + e.content.len())
            .sum();
        let mut out = Vec::with_capacity(payload + EOCD_LEN);
        let mut records = Vec::with_capacity(entries.len());

        for entry in entries {
            let offset = to_u32(out.len(), "local header offset")?;
            let fields = EntryFields {
                flags: if entry.name.is_ascii() { 0 } else { FLAG_UTF8 },
                modified,
                crc32: crc32(&entry.content),
                size: to_u32(entry.content.len(), "entry size")?,
                name_len: entry.name.len() as u16,
            };
            header::write_local_header(&mut out, &fields);
            out.extend_from_slice(entry.name.as_bytes());
            out.extend_from_slice(&entry.content);
            records.push((fields, offset));
        }

        let cd_offset = to_u32(out.len(), "central directory offset")?;
        for (entry, (fields, offset)) in entries.iter().zip(&records) {
            header::write_central_header(&mut out, fields, *offset);
            out.extend_from_slice(entry.name.as_bytes());
        }
        let cd_size = to_u32(out.len(), "central directory end")? - cd_offset;

        header::write_eocd(&mut out, entries.len() as u16, cd_size, cd_offset);

        debug!(
            "built zip: {} entries, {} bytes (central directory at {})",
            entries.len(),
            out.len(),
            cd_offset
        );
        Ok(out)
    }

    /// Build the archive and write it to `path`
    pub fn write_to_path(&self, path: impl AsRef<Path>, entries: &[ArchiveEntry]) -> Result<()> {
        let bytes = self.build(entries)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

fn to_u32(v: usize, what: &str) -> Result<u32> {
    u32::try_from(v)
        .map_err(|_| Error::ArchiveTooLarge(format!("{} {} exceeds the 4 GiB limit without ZIP64", what, v)))
}

fn validate_entries(entries: &[ArchiveEntry]) -> Result<()> {
    if entries.len() > usize::from(u16::MAX) {
        return Err(Error::ArchiveTooLarge(format!(
            "{} entries exceeds the limit of {}",
            entries.len(),
            u16::MAX
        )));
    }

    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if entry.name.is_empty() {
            return Err(Error::InvalidEntryName {
                name: entry.name.clone(),
                reason: "name is empty".into(),
            });
        }
        if entry.name.len() > usize::from(u16::MAX) {
            return Err(Error::InvalidEntryName {
                name: entry.name.chars().take(32).collect(),
                reason: format!("name is {} bytes, limit is {}", entry.name.len(), u16::MAX),
            });
        }
        if !seen.insert(entry.name.as_str()) {
            return Err(Error::DuplicateEntry(entry.name.clone()));
        }
    }
    Ok(())
}
