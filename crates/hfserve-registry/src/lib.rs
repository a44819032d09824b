//! Collection registry for hfserve.
//!
//! This crate turns collection declarations into an immutable, concurrently
//! readable registry of key/value collections and answers lookups against
//! it:
//! - `spec`: `name=path` / `name@path` tokens and their resolution
//! - `document`: the JSON configuration document
//! - `remote`: fetching remote collections into a local cache (WebHDFS)
//! - `residency`: locked, mapped or disk-backed file residency
//! - `table`: the sorted table collection format
//! - `registry`: the fail-fast startup pipeline and the published registry
//! - `lookup`: per-pair lookup outcomes and batch resolution
//!
//! # Example
//!
//! ```no_run
//! use hfserve_registry::{LookupService, Registry, ResolveOptions, SpecSource};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = SpecSource::Tokens(vec!["users=/data/users.hfst".to_string()]);
//!     let specs = source.resolve(&ResolveOptions::default()).await?;
//!
//!     let registry = Registry::build(&specs).await?;
//!     let service = LookupService::new(Arc::new(registry));
//!
//!     println!("{:?}", service.get("users", b"alice"));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod document;
pub mod error;
pub mod lookup;
pub mod reader;
pub mod registry;
pub mod remote;
pub mod residency;
pub mod spec;
pub mod stats;
pub mod table;

pub use error::{FetchError, FormatError, ReadError, ResidencyError, SpecError, StartupError};
pub use lookup::{LookupOutcome, LookupPair, LookupService};
pub use reader::{CollectionFormat, CollectionReader, SortedTableFormat};
pub use registry::{Collection, Registry, RegistryLoader};
pub use remote::{
    CachePolicy, CachedFile, RemoteCache, RemoteCacheConfig, RemoteStore, RetryPolicy,
    WebHdfsStore,
};
pub use residency::{ResidentFile, memlock_limit};
pub use spec::{CollectionSpec, ResidencyMode, ResolveOptions, SpecSource};
pub use stats::{LookupStats, StatsSnapshot};
pub use table::{TableReader, TableWriter};

/// Install the ring crypto provider for rustls.
///
/// reqwest is built without a default provider. Installing twice is
/// harmless, so every HTTP client constructor calls this.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}
