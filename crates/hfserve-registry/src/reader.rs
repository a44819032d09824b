//! Collection reader capability.
//!
//! The registry never interprets collection bytes itself. A
//! [`CollectionFormat`] turns a [`ResidentFile`] into a [`CollectionReader`],
//! and every lookup goes through that reader. [`SortedTableFormat`] is the
//! default.

use crate::error::{FormatError, ReadError};
use crate::residency::ResidentFile;
use crate::table::TableReader;
use bytes::Bytes;

/// Point lookups against one loaded collection.
///
/// Readers are immutable once constructed and must tolerate any number of
/// concurrent callers.
pub trait CollectionReader: Send + Sync {
    /// Value stored under `key`, or `None` if the key is absent.
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, ReadError>;

    /// Number of entries, when the format knows it cheaply.
    fn entry_count(&self) -> Option<u64> {
        None
    }
}

/// Opens collection files of one on-disk format.
pub trait CollectionFormat: Send + Sync {
    /// Take ownership of `file` and produce a reader over it.
    fn open(&self, file: ResidentFile) -> Result<Box<dyn CollectionReader>, FormatError>;

    /// Short format name for logs.
    fn name(&self) -> &'static str;
}

/// The sorted table format (`HFST`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SortedTableFormat;

impl CollectionFormat for SortedTableFormat {
    fn open(&self, file: ResidentFile) -> Result<Box<dyn CollectionReader>, FormatError> {
        Ok(Box::new(TableReader::open(file)?))
    }

    fn name(&self) -> &'static str {
        "sorted-table"
    }
}
