//! Sorted table collection format.
//!
//! A table is a header, a data region holding every key immediately
//! followed by its value, and an index of fixed-size records sorted by key.
//!
//! ```text
//! +--------------------+  0
//! | header (24 bytes)  |
//! +--------------------+  24
//! | key0 value0        |
//! | key1 value1        |
//! | ...                |
//! +--------------------+  index_offset
//! | index record 0     |  16 bytes each, sorted by key
//! | index record 1     |
//! | ...                |
//! +--------------------+
//! ```
//!
//! All integers are little-endian.

mod header;
mod reader;
mod writer;

pub use header::{
    HEADER_SIZE, INDEX_RECORD_SIZE, IndexRecord, TABLE_MAGIC, TABLE_VERSION, TableHeader,
};
pub use reader::TableReader;
pub use writer::TableWriter;
