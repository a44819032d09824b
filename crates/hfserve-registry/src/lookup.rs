//! Lookup service.
//!
//! Every `(collection, key)` pair is resolved on its own: an unknown
//! collection or a failed read is reported for that pair and never affects
//! its siblings. Nothing here is fatal.

use crate::registry::Registry;
use crate::stats::LookupStats;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of resolving one `(collection, key)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Key present, with its value
    Found(Bytes),
    /// Collection loaded, key absent
    NotFound,
    /// No collection with that name is loaded
    UnknownCollection,
    /// The read itself failed
    Failed(String),
}

impl LookupOutcome {
    /// Value, if found.
    pub const fn value(&self) -> Option<&Bytes> {
        match self {
            Self::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// One pair of a batch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupPair {
    /// Collection name
    pub collection: String,
    /// Key bytes
    pub key: Bytes,
}

impl LookupPair {
    /// Create a pair.
    pub fn new(collection: impl Into<String>, key: impl Into<Bytes>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
        }
    }
}

/// Answers lookups against a published registry.
#[derive(Debug, Clone)]
pub struct LookupService {
    registry: Arc<Registry>,
    stats: Arc<LookupStats>,
}

impl LookupService {
    /// Serve lookups from `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            stats: Arc::new(LookupStats::new()),
        }
    }

    /// The registry being served.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Lookup counters.
    pub fn stats(&self) -> &LookupStats {
        &self.stats
    }

    /// Resolve a single pair.
    pub fn get(&self, collection: &str, key: &[u8]) -> LookupOutcome {
        self.stats.record_request();
        self.resolve(collection, key)
    }

    /// Resolve every pair, preserving order.
    pub fn get_batch(&self, pairs: &[LookupPair]) -> Vec<LookupOutcome> {
        self.stats.record_request();
        pairs
            .iter()
            .map(|pair| self.resolve(&pair.collection, &pair.key))
            .collect()
    }

    /// Resolve several keys against one collection, preserving order.
    pub fn get_many<K: AsRef<[u8]>>(&self, collection: &str, keys: &[K]) -> Vec<LookupOutcome> {
        self.stats.record_request();
        keys.iter()
            .map(|key| self.resolve(collection, key.as_ref()))
            .collect()
    }

    fn resolve(&self, name: &str, key: &[u8]) -> LookupOutcome {
        let Some(collection) = self.registry.lookup(name) else {
            debug!("Lookup in unknown collection '{}'", name);
            self.stats.record_unknown_collection();
            return LookupOutcome::UnknownCollection;
        };

        match collection.get(key) {
            Ok(Some(value)) => {
                self.stats.record_found();
                LookupOutcome::Found(value)
            }
            Ok(None) => {
                self.stats.record_not_found();
                LookupOutcome::NotFound
            }
            Err(e) => {
                warn!("Lookup in '{}' failed: {}", name, e);
                self.stats.record_failed();
                LookupOutcome::Failed(e.to_string())
            }
        }
    }
}
