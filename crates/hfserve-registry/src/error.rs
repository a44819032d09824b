//! Error types for collection loading and lookup.
//!
//! Startup errors (`SpecError`, `FetchError`, `ResidencyError`,
//! `FormatError`) are fatal and end up wrapped in `StartupError`, which names
//! the collection that failed. `ReadError` is the only request-time error and
//! is reported per lookup rather than propagated.

use crate::spec::ResidencyMode;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning CLI tokens or a configuration document into
/// collection specs.
#[derive(Debug, Error)]
pub enum SpecError {
    /// Token is not of the form `name=path` or `name@path`
    #[error("malformed collection spec '{token}': {reason}")]
    MalformedToken {
        /// The offending token
        token: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Both command-line specs and a configuration document were supplied
    #[error("only one of command-line collection specs or a configuration document may be used")]
    ConflictingSources,

    /// Neither command-line specs nor a configuration document were supplied
    #[error("no collections specified: pass 'name=path' arguments or a configuration document")]
    NoCollections,

    /// Configuration document request failed
    #[error("failed to fetch configuration document {url}: {source}")]
    DocumentFetch {
        /// Document URL
        url: String,
        /// Underlying HTTP error
        #[source]
        source: reqwest::Error,
    },

    /// Configuration document server answered with a non-success status
    #[error("configuration document {url} returned HTTP {status}")]
    DocumentStatus {
        /// Document URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Local configuration document could not be read
    #[error("failed to read configuration document {path}: {source}")]
    DocumentRead {
        /// Document path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration document is not valid JSON or has the wrong shape
    #[error("invalid configuration document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    /// A record in the configuration document has an empty field
    #[error("configuration document record {index} has an empty {field}")]
    EmptyField {
        /// Zero-based record position
        index: usize,
        /// Field name
        field: &'static str,
    },
}

/// Errors raised while fetching a remote collection into the local cache.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Remote object does not exist
    #[error("remote collection not found: {location}")]
    NotFound {
        /// Remote location as declared in the spec
        location: String,
    },

    /// Remote store answered with an unexpected status
    #[error("remote store returned HTTP {status} for {location}")]
    Status {
        /// Remote location as declared in the spec
        location: String,
        /// HTTP status code
        status: u16,
    },

    /// Transport failure talking to the remote store
    #[error("transfer of {location} failed: {source}")]
    Http {
        /// Remote location as declared in the spec
        location: String,
        /// Underlying HTTP error
        #[source]
        source: reqwest::Error,
    },

    /// Transfer ended before the advertised length was received
    #[error("transfer of {location} interrupted: received {received} of {expected} bytes")]
    Truncated {
        /// Remote location as declared in the spec
        location: String,
        /// Advertised content length
        expected: u64,
        /// Bytes actually written
        received: u64,
    },

    /// Local cache file could not be written
    #[error("failed to write cache file {path}: {source}")]
    Io {
        /// Cache file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Remote endpoint or location could not be turned into a request URL
    #[error("invalid remote endpoint: {0}")]
    InvalidEndpoint(String),
}

impl FetchError {
    /// Whether a retry has a chance of succeeding.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Http { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_body()
            }
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Truncated { .. } => true,
            Self::NotFound { .. } | Self::Io { .. } | Self::InvalidEndpoint(_) => false,
        }
    }
}

/// Errors raised while establishing a collection's memory residency.
#[derive(Debug, Error)]
pub enum ResidencyError {
    /// File could not be opened or inspected
    #[error("failed to open {path}: {source}")]
    Open {
        /// Local file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is empty and cannot back a collection
    #[error("{path} is empty")]
    Empty {
        /// Local file path
        path: PathBuf,
    },

    /// Memory mapping failed
    #[error("failed to map {path}: {source}")]
    Map {
        /// Local file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Pinning the mapped pages failed
    #[error(
        "failed to lock {size} bytes of {path} in memory (RLIMIT_MEMLOCK soft limit: {}): {source}; \
         raise the locked-memory limit (ulimit -l, or LimitMEMLOCK for systemd units) \
         or serve the collection with 'name@path'",
        describe_limit(.limit)
    )]
    Lock {
        /// Local file path
        path: PathBuf,
        /// Number of bytes that had to be locked
        size: u64,
        /// Current soft limit, when it could be read
        limit: Option<u64>,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Residency mode is not available on this platform
    #[error("{mode} residency is not supported on this platform")]
    Unsupported {
        /// Requested mode
        mode: ResidencyMode,
    },
}

#[allow(clippy::ref_option)]
fn describe_limit(limit: &Option<u64>) -> String {
    match limit {
        Some(u64::MAX) => "unlimited".to_string(),
        Some(bytes) => format!("{bytes} bytes"),
        None => "unknown".to_string(),
    }
}

/// Errors raised while opening a collection file.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Header magic does not match
    #[error("invalid magic: expected 'HFST', got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Header version is not understood
    #[error("unsupported table version: {0}")]
    UnsupportedVersion(u32),

    /// Header or index points outside the file
    #[error("truncated table: {0}")]
    Truncated(String),

    /// Key or value does not fit a 32-bit length field
    #[error("entry of {0} bytes exceeds the 4 GiB limit")]
    EntryTooLarge(usize),

    /// Duplicate key handed to the writer
    #[error("duplicate key: {}", hex::encode(.0))]
    DuplicateKey(Vec<u8>),

    /// Binary structure could not be parsed or written
    #[error("binary format error: {0}")]
    Binary(#[from] binrw::Error),

    /// I/O failure while reading or writing a table
    #[error("table I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while answering a lookup.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Positioned read against an on-disk collection failed
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    /// File contents contradict the index
    #[error("corrupt collection: {0}")]
    Corrupt(String),
}

/// Fatal startup error. The first failing collection aborts the build.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Spec resolution failed
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Same name declared twice
    #[error("collection '{0}' is declared more than once")]
    DuplicateName(String),

    /// Remote fetch failed
    #[error("collection '{name}': {source}")]
    Fetch {
        /// Collection name
        name: String,
        /// Underlying fetch error
        #[source]
        source: FetchError,
    },

    /// Residency setup failed
    #[error("collection '{name}': {source}")]
    Residency {
        /// Collection name
        name: String,
        /// Underlying residency error
        #[source]
        source: ResidencyError,
    },

    /// Collection file is malformed
    #[error("collection '{name}': {source}")]
    Format {
        /// Collection name
        name: String,
        /// Underlying format error
        #[source]
        source: FormatError,
    },
}
