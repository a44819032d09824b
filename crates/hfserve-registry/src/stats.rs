//! Process-wide lookup counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by every request-handling task.
#[derive(Debug, Default)]
pub struct LookupStats {
    requests: AtomicU64,
    lookups: AtomicU64,
    found: AtomicU64,
    not_found: AtomicU64,
    unknown_collection: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`LookupStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Requests (single or batch) answered
    pub requests: u64,
    /// Individual `(collection, key)` pairs resolved
    pub lookups: u64,
    /// Pairs that found a value
    pub found: u64,
    /// Pairs whose key was absent
    pub not_found: u64,
    /// Pairs naming a collection that is not loaded
    pub unknown_collection: u64,
    /// Pairs whose read failed
    pub failed: u64,
}

impl LookupStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_found(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.found.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_not_found(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unknown_collection(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.unknown_collection.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
            found: self.found.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            unknown_collection: self.unknown_collection.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
