//! Sorted table lookups

use super::header::{HEADER_SIZE, INDEX_RECORD_SIZE, IndexRecord, TableHeader};
use crate::error::{FormatError, ReadError};
use crate::reader::CollectionReader;
use crate::residency::ResidentFile;
use binrw::BinRead;
use binrw::io::Cursor;
use bytes::Bytes;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::io;

/// Binary-search reader over a resident sorted table.
///
/// Works the same over a memory map and over positioned disk reads; only
/// the cost of each probe differs.
#[derive(Debug)]
pub struct TableReader {
    file: ResidentFile,
    header: TableHeader,
}

impl TableReader {
    /// Validate the header of `file` and take ownership of it.
    pub fn open(file: ResidentFile) -> Result<Self, FormatError> {
        let header = {
            let bytes = file.read_at(0, HEADER_SIZE).map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    FormatError::Truncated(format!(
                        "{} bytes is shorter than the {HEADER_SIZE} byte header",
                        file.len()
                    ))
                } else {
                    FormatError::Io(e)
                }
            })?;
            TableHeader::read(&mut Cursor::new(&bytes[..]))?
        };
        header.validate(file.len())?;

        Ok(Self { file, header })
    }

    /// Parsed header.
    pub const fn header(&self) -> &TableHeader {
        &self.header
    }

    /// Underlying resident file.
    pub const fn file(&self) -> &ResidentFile {
        &self.file
    }

    /// Look up `key`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>, ReadError> {
        let mut lo = 0u64;
        let mut hi = self.header.entry_count;

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let record = self.record(mid)?;
            let value_offset = self.value_offset(mid, &record)?;
            let candidate = self.file.read_at(record.key_offset, record.key_len as usize)?;

            match candidate[..].cmp(key) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => {
                    let value = self.file.read_at(value_offset, record.value_len as usize)?;
                    return Ok(Some(into_bytes(value)));
                }
            }
        }

        Ok(None)
    }

    fn record(&self, index: u64) -> Result<IndexRecord, ReadError> {
        // The header was validated, so this cannot overflow.
        let offset = self.header.index_offset + index * INDEX_RECORD_SIZE as u64;
        let bytes = self.file.read_at(offset, INDEX_RECORD_SIZE)?;
        IndexRecord::read(&mut Cursor::new(&bytes[..]))
            .map_err(|e| ReadError::Corrupt(format!("index record {index}: {e}")))
    }

    fn value_offset(&self, index: u64, record: &IndexRecord) -> Result<u64, ReadError> {
        match (record.value_offset(), record.end()) {
            (Some(value_offset), Some(end))
                if record.key_offset >= HEADER_SIZE as u64 && end <= self.header.index_offset =>
            {
                Ok(value_offset)
            }
            _ => Err(ReadError::Corrupt(format!(
                "index record {index} points outside the data region"
            ))),
        }
    }
}

impl CollectionReader for TableReader {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, ReadError> {
        Self::get(self, key)
    }

    fn entry_count(&self) -> Option<u64> {
        Some(self.header.entry_count)
    }
}

fn into_bytes(value: Cow<'_, [u8]>) -> Bytes {
    match value {
        Cow::Borrowed(slice) => Bytes::copy_from_slice(slice),
        Cow::Owned(vec) => Bytes::from(vec),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ResidencyMode;
    use crate::table::TableWriter;
    use binrw::BinWrite;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn table(entries: &[(&str, &str)]) -> NamedTempFile {
        let mut writer = TableWriter::new();
        for (key, value) in entries {
            writer.insert(*key, *value).unwrap();
        }
        write_table(&writer)
    }

    fn write_table(writer: &TableWriter) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        writer.write_file(file.path()).unwrap();
        file
    }

    fn open(file: &NamedTempFile, mode: ResidencyMode) -> TableReader {
        TableReader::open(ResidentFile::load(file.path(), mode).unwrap()).unwrap()
    }

    #[test]
    fn test_lookup_in_every_mode() {
        let file = table(&[
            ("apple", "red"),
            ("banana", "yellow"),
            ("cherry", ""),
            ("date", "brown"),
        ]);

        for mode in [ResidencyMode::Disk, ResidencyMode::Mapped] {
            let reader = open(&file, mode);
            assert_eq!(reader.header().entry_count, 4);
            assert_eq!(reader.get(b"apple").unwrap().unwrap(), &b"red"[..]);
            assert_eq!(reader.get(b"banana").unwrap().unwrap(), &b"yellow"[..]);
            assert_eq!(reader.get(b"cherry").unwrap().unwrap(), &b""[..]);
            assert_eq!(reader.get(b"date").unwrap().unwrap(), &b"brown"[..]);
            assert_eq!(reader.get(b"aardvark").unwrap(), None);
            assert_eq!(reader.get(b"blueberry").unwrap(), None);
            assert_eq!(reader.get(b"zucchini").unwrap(), None);
            assert_eq!(reader.get(b"").unwrap(), None);
        }
    }

    #[test]
    fn test_empty_table() {
        let file = table(&[]);
        let reader = open(&file, ResidencyMode::Mapped);
        assert_eq!(reader.header().entry_count, 0);
        assert_eq!(reader.get(b"anything").unwrap(), None);
    }

    #[test]
    fn test_binary_keys() {
        let mut writer = TableWriter::new();
        writer.insert(vec![0u8, 1, 2], vec![9u8]).unwrap();
        writer.insert(vec![0xffu8, 0xfe], vec![8u8]).unwrap();
        let file = write_table(&writer);
        let reader = open(&file, ResidencyMode::Disk);
        assert_eq!(reader.get(&[0, 1, 2]).unwrap().unwrap(), &[9u8][..]);
        assert_eq!(reader.get(&[0xff, 0xfe]).unwrap().unwrap(), &[8u8][..]);
    }

    #[test]
    fn test_rejects_foreign_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"this is not a sorted table at all").unwrap();
        let resident = ResidentFile::load(file.path(), ResidencyMode::Mapped).unwrap();
        assert!(matches!(
            TableReader::open(resident),
            Err(FormatError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_rejects_short_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"HFST").unwrap();
        let resident = ResidentFile::load(file.path(), ResidencyMode::Disk).unwrap();
        assert!(matches!(
            TableReader::open(resident),
            Err(FormatError::Truncated(_))
        ));
    }

    #[test]
    fn test_corrupt_index_is_a_read_error() {
        // One record whose key points past the index.
        let mut bytes = Cursor::new(Vec::new());
        TableHeader::new(1, 24).write(&mut bytes).unwrap();
        IndexRecord {
            key_offset: 1000,
            key_len: 4,
            value_len: 4,
        }
        .write(&mut bytes)
        .unwrap();

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&bytes.into_inner()).unwrap();

        let reader = open(&file, ResidencyMode::Disk);
        assert!(matches!(reader.get(b"key"), Err(ReadError::Corrupt(_))));
    }
}
