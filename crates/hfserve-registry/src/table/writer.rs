//! Sorted table building

use super::header::{HEADER_SIZE, INDEX_RECORD_SIZE, IndexRecord, TableHeader};
use crate::error::FormatError;
use binrw::BinWrite;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

/// Builds a sorted table from unordered entries.
#[derive(Debug, Clone, Default)]
pub struct TableWriter {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl TableWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Keys must be unique.
    pub fn insert(
        &mut self,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Result<(), FormatError> {
        let key = key.into();
        let value = value.into();

        if key.len() > u32::MAX as usize {
            return Err(FormatError::EntryTooLarge(key.len()));
        }
        if value.len() > u32::MAX as usize {
            return Err(FormatError::EntryTooLarge(value.len()));
        }

        match self.entries.entry(key) {
            Entry::Occupied(entry) => Err(FormatError::DuplicateKey(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
        }
    }

    /// Number of entries added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode the table, returning the number of bytes written.
    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> Result<u64, FormatError> {
        let data_len: u64 = self
            .entries
            .iter()
            .map(|(key, value)| (key.len() + value.len()) as u64)
            .sum();
        let index_offset = HEADER_SIZE as u64 + data_len;
        let entry_count = self.entries.len() as u64;

        TableHeader::new(entry_count, index_offset).write(writer)?;

        let mut records = Vec::with_capacity(self.entries.len());
        let mut offset = HEADER_SIZE as u64;
        for (key, value) in &self.entries {
            writer.write_all(key)?;
            writer.write_all(value)?;
            records.push(IndexRecord {
                key_offset: offset,
                key_len: key.len() as u32,
                value_len: value.len() as u32,
            });
            offset += (key.len() + value.len()) as u64;
        }

        for record in &records {
            record.write(writer)?;
        }

        Ok(index_offset + entry_count * INDEX_RECORD_SIZE as u64)
    }

    /// Encode the table into a new file at `path`.
    pub fn write_file(&self, path: &Path) -> Result<u64, FormatError> {
        let mut writer = BufWriter::new(File::create(path)?);
        let written = self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(written)
    }
}
