//! Collection registry.
//!
//! The registry is built once, sequentially and fail-fast: the first spec
//! that cannot be fetched, made resident or opened aborts the whole build,
//! and nothing is published. A built registry is never mutated, so it can
//! be shared behind an `Arc` and read from any number of tasks without
//! locking.

use crate::error::{ReadError, StartupError};
use crate::reader::{CollectionFormat, CollectionReader, SortedTableFormat};
use crate::remote::RemoteCache;
use crate::residency::ResidentFile;
use crate::spec::{CollectionSpec, ResidencyMode};
use bytes::Bytes;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// A loaded, lookup-capable collection.
pub struct Collection {
    name: String,
    source: String,
    local_path: PathBuf,
    mode: ResidencyMode,
    remote: bool,
    size_bytes: u64,
    reader: Box<dyn CollectionReader>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("local_path", &self.local_path)
            .field("mode", &self.mode)
            .field("remote", &self.remote)
            .field("size_bytes", &self.size_bytes)
            .finish_non_exhaustive()
    }
}

impl Collection {
    /// Wrap an already constructed reader.
    ///
    /// The registry loader uses this after residency and format setup;
    /// callers may also use it to serve readers that do not come from a
    /// file at all.
    pub fn from_reader(
        spec: &CollectionSpec,
        local_path: impl Into<PathBuf>,
        size_bytes: u64,
        reader: Box<dyn CollectionReader>,
    ) -> Self {
        let local_path = local_path.into();
        Self {
            name: spec.name.clone(),
            source: spec.source.clone(),
            local_path,
            remote: false,
            mode: spec.mode,
            size_bytes,
            reader,
        }
    }

    #[must_use]
    fn fetched_remotely(mut self) -> Self {
        self.remote = true;
        self
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source location as declared.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Path of the file actually loaded; the cache path for remote sources.
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Residency mode in effect.
    pub const fn mode(&self) -> ResidencyMode {
        self.mode
    }

    /// Whether the file was fetched from remote storage.
    pub const fn is_remote(&self) -> bool {
        self.remote
    }

    /// File size in bytes.
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Entry count, when the reader knows it.
    pub fn entry_count(&self) -> Option<u64> {
        self.reader.entry_count()
    }

    /// Look up `key` in this collection.
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>, ReadError> {
        self.reader.get(key)
    }
}

/// Immutable mapping from collection name to [`Collection`].
#[derive(Debug, Default)]
pub struct Registry {
    collections: HashMap<String, Collection>,
}

impl Registry {
    /// Build a registry with the default loader (local files only, sorted
    /// table format).
    pub async fn build(specs: &[CollectionSpec]) -> Result<Self, StartupError> {
        RegistryLoader::new().build(specs).await
    }

    /// Assemble a registry from collections that are already loaded.
    pub fn from_collections(
        collections: impl IntoIterator<Item = Collection>,
    ) -> Result<Self, StartupError> {
        let mut registry = Self::default();
        for collection in collections {
            registry.insert(collection)?;
        }
        Ok(registry)
    }

    fn insert(&mut self, collection: Collection) -> Result<(), StartupError> {
        match self.collections.entry(collection.name.clone()) {
            Entry::Occupied(entry) => Err(StartupError::DuplicateName(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(collection);
                Ok(())
            }
        }
    }

    /// The collection named `name`, if loaded.
    pub fn lookup(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    /// Number of collections.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// Whether no collections are loaded.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Collection names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.collections.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Collections sorted by name.
    pub fn collections(&self) -> Vec<&Collection> {
        let mut collections: Vec<&Collection> = self.collections.values().collect();
        collections.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        collections
    }
}

/// Drives the startup pipeline: fetch, residency, format, insert.
#[derive(Clone)]
pub struct RegistryLoader {
    remote: Option<RemoteCache>,
    format: Arc<dyn CollectionFormat>,
}

impl std::fmt::Debug for RegistryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryLoader")
            .field("remote", &self.remote)
            .field("format", &self.format.name())
            .finish()
    }
}

impl Default for RegistryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryLoader {
    /// Loader for local sorted-table files.
    pub fn new() -> Self {
        Self {
            remote: None,
            format: Arc::new(SortedTableFormat),
        }
    }

    /// Fetch specs matching the cache's remote prefix before loading them.
    #[must_use]
    pub fn with_remote(mut self, remote: RemoteCache) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Open collection files with `format` instead of the sorted table.
    #[must_use]
    pub fn with_format(mut self, format: Arc<dyn CollectionFormat>) -> Self {
        self.format = format;
        self
    }

    /// Load every spec in order and publish the registry.
    ///
    /// Fails on the first spec that cannot be loaded, and on a name that
    /// appears twice. Resources of collections loaded before the failure
    /// are released when the error is returned.
    pub async fn build(&self, specs: &[CollectionSpec]) -> Result<Registry, StartupError> {
        let mut registry = Registry {
            collections: HashMap::with_capacity(specs.len()),
        };

        for spec in specs {
            if registry.collections.contains_key(&spec.name) {
                return Err(StartupError::DuplicateName(spec.name.clone()));
            }
            let collection = self.load(spec).await?;
            registry.insert(collection)?;
        }

        info!(
            "Registry ready with {} collections ({})",
            registry.len(),
            self.format.name()
        );
        Ok(registry)
    }

    async fn load(&self, spec: &CollectionSpec) -> Result<Collection, StartupError> {
        let remote = self
            .remote
            .as_ref()
            .filter(|cache| cache.is_remote(&spec.source));

        let local_path = match remote {
            Some(cache) => {
                cache
                    .fetch(&spec.source)
                    .await
                    .map_err(|source| StartupError::Fetch {
                        name: spec.name.clone(),
                        source,
                    })?
                    .local_path
            }
            None => PathBuf::from(&spec.source),
        };

        let file =
            ResidentFile::load(&local_path, spec.mode).map_err(|source| StartupError::Residency {
                name: spec.name.clone(),
                source,
            })?;
        let size_bytes = file.len();

        let reader = self
            .format
            .open(file)
            .map_err(|source| StartupError::Format {
                name: spec.name.clone(),
                source,
            })?;

        info!(
            "Collection '{}' ready: {} ({} bytes, {})",
            spec.name,
            spec.source,
            size_bytes,
            spec.mode
        );

        let collection = Collection::from_reader(spec, local_path, size_bytes, reader);
        Ok(if remote.is_some() {
            collection.fetched_remotely()
        } else {
            collection
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FormatError, ResidencyError};
    use crate::table::TableWriter;
    use tempfile::TempDir;

    fn write_table(dir: &TempDir, name: &str, entries: &[(&str, &str)]) -> String {
        let mut writer = TableWriter::new();
        for (key, value) in entries {
            writer.insert(*key, *value).unwrap();
        }
        let path = dir.path().join(name);
        writer.write_file(&path).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_build_and_lookup() {
        let dir = TempDir::new().unwrap();
        let a = write_table(&dir, "a.hfst", &[("k1", "v1")]);
        let b = write_table(&dir, "b.hfst", &[("k2", "v2")]);

        let registry = Registry::build(&[
            CollectionSpec::new("a", a.clone(), ResidencyMode::Mapped),
            CollectionSpec::new("b", b, ResidencyMode::Disk),
        ])
        .await
        .unwrap();

        assert_eq!(registry.names(), vec!["a", "b"]);
        let collection = registry.lookup("a").unwrap();
        assert_eq!(collection.source(), a);
        assert!(!collection.is_remote());
        assert_eq!(collection.entry_count(), Some(1));
        assert_eq!(collection.get(b"k1").unwrap().unwrap(), &b"v1"[..]);
        assert!(registry.lookup("c").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_fails_build() {
        let dir = TempDir::new().unwrap();
        let a = write_table(&dir, "a.hfst", &[("k", "v")]);

        let result = Registry::build(&[
            CollectionSpec::new("a", a.clone(), ResidencyMode::Disk),
            CollectionSpec::new("a", a, ResidencyMode::Disk),
        ])
        .await;
        assert!(matches!(result, Err(StartupError::DuplicateName(name)) if name == "a"));
    }

    #[tokio::test]
    async fn test_missing_file_fails_build() {
        let dir = TempDir::new().unwrap();
        let a = write_table(&dir, "a.hfst", &[("k", "v")]);

        let result = Registry::build(&[
            CollectionSpec::new("a", a, ResidencyMode::Disk),
            CollectionSpec::new("b", "/nonexistent/b.hfst", ResidencyMode::Disk),
        ])
        .await;
        assert!(matches!(
            result,
            Err(StartupError::Residency {
                name,
                source: ResidencyError::Open { .. }
            }) if name == "b"
        ));
    }

    #[tokio::test]
    async fn test_malformed_file_fails_build() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.hfst");
        std::fs::write(&path, b"definitely not a table, but long enough").unwrap();

        let result = Registry::build(&[CollectionSpec::new(
            "junk",
            path.to_string_lossy(),
            ResidencyMode::Mapped,
        )])
        .await;
        assert!(matches!(
            result,
            Err(StartupError::Format {
                source: FormatError::InvalidMagic(_),
                ..
            })
        ));
    }
}
