//! Table header and index record layouts

use crate::error::FormatError;
use binrw::{BinRead, BinWrite};

/// Magic signature at the start of every table
pub const TABLE_MAGIC: [u8; 4] = *b"HFST";

/// Current table version
pub const TABLE_VERSION: u32 = 1;

/// Encoded header size in bytes
pub const HEADER_SIZE: usize = 24;

/// Encoded index record size in bytes
pub const INDEX_RECORD_SIZE: usize = 16;

/// Table header
///
/// - Magic signature "HFST" (4 bytes)
/// - Version number (4 bytes, currently 1)
/// - Entry count (8 bytes)
/// - Offset of the index region (8 bytes)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct TableHeader {
    /// Magic signature, always "HFST"
    pub magic: [u8; 4],

    /// Format version
    pub version: u32,

    /// Number of entries
    pub entry_count: u64,

    /// Byte offset of the first index record
    pub index_offset: u64,
}

impl TableHeader {
    /// Create a header for `entry_count` entries with the index at `index_offset`.
    pub const fn new(entry_count: u64, index_offset: u64) -> Self {
        Self {
            magic: TABLE_MAGIC,
            version: TABLE_VERSION,
            entry_count,
            index_offset,
        }
    }

    /// Byte length of the index region.
    pub fn index_len(&self) -> Option<u64> {
        self.entry_count.checked_mul(INDEX_RECORD_SIZE as u64)
    }

    /// Validate the header against the size of the file holding it.
    pub fn validate(&self, file_len: u64) -> Result<(), FormatError> {
        if self.magic != TABLE_MAGIC {
            return Err(FormatError::InvalidMagic(self.magic));
        }

        if self.version != TABLE_VERSION {
            return Err(FormatError::UnsupportedVersion(self.version));
        }

        if self.index_offset < HEADER_SIZE as u64 {
            return Err(FormatError::Truncated(format!(
                "index offset {} overlaps the header",
                self.index_offset
            )));
        }

        let index_end = self
            .index_len()
            .and_then(|len| len.checked_add(self.index_offset));
        match index_end {
            Some(end) if end <= file_len => Ok(()),
            _ => Err(FormatError::Truncated(format!(
                "{} index records at offset {} do not fit in {} bytes",
                self.entry_count, self.index_offset, file_len
            ))),
        }
    }
}

/// Index record locating one entry in the data region
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct IndexRecord {
    /// Offset of the key bytes; the value follows the key directly
    pub key_offset: u64,

    /// Key length in bytes
    pub key_len: u32,

    /// Value length in bytes
    pub value_len: u32,
}

impl IndexRecord {
    /// Offset of the value bytes.
    pub fn value_offset(&self) -> Option<u64> {
        self.key_offset.checked_add(u64::from(self.key_len))
    }

    /// Offset just past the value bytes.
    pub fn end(&self) -> Option<u64> {
        self.value_offset()?.checked_add(u64::from(self.value_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::io::Cursor;

    #[test]
    fn test_header_layout() {
        let header = TableHeader::new(2, 40);
        let mut cursor = Cursor::new(Vec::new());
        header.write(&mut cursor).unwrap();

        let bytes = cursor.into_inner();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"HFST");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[8..16], &2u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &40u64.to_le_bytes());

        let parsed = TableHeader::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_index_record_layout() {
        let record = IndexRecord {
            key_offset: 24,
            key_len: 3,
            value_len: 5,
        };
        let mut cursor = Cursor::new(Vec::new());
        record.write(&mut cursor).unwrap();
        assert_eq!(cursor.into_inner().len(), INDEX_RECORD_SIZE);
        assert_eq!(record.value_offset(), Some(27));
        assert_eq!(record.end(), Some(32));

        let overflowing = IndexRecord {
            key_offset: u64::MAX,
            key_len: 1,
            value_len: 0,
        };
        assert_eq!(overflowing.end(), None);
    }

    #[test]
    fn test_header_validation() {
        let header = TableHeader::new(2, 40);
        assert!(header.validate(72).is_ok());

        let mut bad_magic = header.clone();
        bad_magic.magic = *b"NOPE";
        assert!(matches!(
            bad_magic.validate(72),
            Err(FormatError::InvalidMagic(_))
        ));

        let mut bad_version = header.clone();
        bad_version.version = 7;
        assert!(matches!(
            bad_version.validate(72),
            Err(FormatError::UnsupportedVersion(7))
        ));

        assert!(matches!(
            header.validate(71),
            Err(FormatError::Truncated(_))
        ));
        assert!(matches!(
            TableHeader::new(u64::MAX, 40).validate(u64::MAX),
            Err(FormatError::Truncated(_))
        ));
        assert!(matches!(
            TableHeader::new(0, 8).validate(24),
            Err(FormatError::Truncated(_))
        ));
    }
}
