//! Remote fetch and local cache.
//!
//! Specs whose source starts with the configured remote prefix are fetched
//! once into a local cache directory before they are loaded. The cache file
//! name is derived from the remote location, so the same location always
//! lands on the same local path. Cached files are never removed by hfserve.

mod retry;
mod webhdfs;

pub use retry::RetryPolicy;
pub use webhdfs::WebHdfsStore;

use crate::error::FetchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const PARTIAL_SUFFIX: &str = "partial";

/// Client for the remote filesystem holding collection files.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Copy the object at `location` to `destination`, replacing it.
    async fn fetch(&self, location: &str, destination: &Path) -> Result<(), FetchError>;
}

/// Whether an existing cache file is reused or downloaded again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Use the cached file when it exists
    Reuse,
    /// Always download, overwriting the cached file
    #[default]
    Refetch,
}

/// Remote cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCacheConfig {
    /// Source prefix identifying remote collections
    pub prefix: String,
    /// Directory receiving fetched files
    pub cache_dir: PathBuf,
    /// Reuse or refetch existing cache files
    pub policy: CachePolicy,
}

impl RemoteCacheConfig {
    /// Whether `source` names a remote collection.
    pub fn is_remote(&self, source: &str) -> bool {
        !self.prefix.is_empty() && source.starts_with(&self.prefix)
    }

    /// Deterministic local path for a remote location.
    pub fn cache_path(&self, location: &str) -> PathBuf {
        let digest = hex::encode(md5::compute(location.as_bytes()).0);
        let basename = location
            .rsplit('/')
            .find(|part| !part.is_empty())
            .unwrap_or("collection");
        self.cache_dir.join(format!("{}-{}", &digest[..16], basename))
    }
}

/// A remote collection materialized on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFile {
    /// Location as declared in the spec
    pub remote_location: String,
    /// Path of the local copy
    pub local_path: PathBuf,
    /// Whether this run downloaded the file
    pub fetched: bool,
}

/// Fetches remote collections into the cache directory.
#[derive(Clone)]
pub struct RemoteCache {
    config: RemoteCacheConfig,
    store: Arc<dyn RemoteStore>,
}

impl std::fmt::Debug for RemoteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RemoteCache {
    /// Create a cache backed by `store`.
    pub fn new(config: RemoteCacheConfig, store: Arc<dyn RemoteStore>) -> Self {
        Self { config, store }
    }

    /// Cache settings.
    pub const fn config(&self) -> &RemoteCacheConfig {
        &self.config
    }

    /// Whether `source` names a remote collection.
    pub fn is_remote(&self, source: &str) -> bool {
        self.config.is_remote(source)
    }

    /// Make the object at `location` available locally.
    ///
    /// The download goes to a `.partial` file that is renamed into place
    /// once complete, so an interrupted transfer never leaves a file a
    /// later run would reuse.
    pub async fn fetch(&self, location: &str) -> Result<CachedFile, FetchError> {
        let local_path = self.config.cache_path(location);

        if self.config.policy == CachePolicy::Reuse
            && tokio::fs::try_exists(&local_path).await.unwrap_or(false)
        {
            debug!(
                "Reusing cached copy of {} at {}",
                location,
                local_path.display()
            );
            return Ok(CachedFile {
                remote_location: location.to_string(),
                local_path,
                fetched: false,
            });
        }

        tokio::fs::create_dir_all(&self.config.cache_dir)
            .await
            .map_err(|source| FetchError::Io {
                path: self.config.cache_dir.clone(),
                source,
            })?;

        let partial = partial_path(&local_path);
        info!("Fetching {} to {}", location, local_path.display());

        if let Err(e) = self.store.fetch(location, &partial).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        tokio::fs::rename(&partial, &local_path)
            .await
            .map_err(|source| FetchError::Io {
                path: local_path.clone(),
                source,
            })?;

        Ok(CachedFile {
            remote_location: location.to_string(),
            local_path,
            fetched: true,
        })
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}
