//! Operator-facing view of the registry.
//!
//! Reports only what was declared (collection name, mode, source location)
//! and what was measured (size, entries, counters). Local cache paths of
//! remote collections are never shown.

use crate::server::AppState;
use hfserve_registry::{Collection, ResidencyMode, StatsSnapshot};
use serde::Serialize;
use std::fmt::Write;

/// One collection as reported to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    /// Collection name
    pub name: String,
    /// Residency mode in effect
    pub mode: ResidencyMode,
    /// Source location as declared
    pub source: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Entry count, when known
    pub entries: Option<u64>,
    /// Whether the collection was fetched from remote storage
    pub remote: bool,
}

impl From<&Collection> for CollectionInfo {
    fn from(collection: &Collection) -> Self {
        Self {
            name: collection.name().to_string(),
            mode: collection.mode(),
            source: collection.source().to_string(),
            size_bytes: collection.size_bytes(),
            entries: collection.entry_count(),
            remote: collection.is_remote(),
        }
    }
}

/// Full status document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    /// Seconds since the server started
    pub uptime_seconds: u64,
    /// Loaded collections, sorted by name
    pub collections: Vec<CollectionInfo>,
    /// Lookup counters
    pub stats: StatsSnapshot,
}

impl StatusReport {
    /// Snapshot the current state.
    #[must_use]
    pub fn from_state(state: &AppState) -> Self {
        Self {
            uptime_seconds: state.uptime_seconds(),
            collections: state
                .registry()
                .collections()
                .into_iter()
                .map(CollectionInfo::from)
                .collect(),
            stats: state.service().stats().snapshot(),
        }
    }

    /// Render as a plain-text page.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "hfserve {}: {} collections, up {}s",
            env!("CARGO_PKG_VERSION"),
            self.collections.len(),
            self.uptime_seconds
        );
        let _ = writeln!(out);

        let name_width = self
            .collections
            .iter()
            .map(|c| c.name.len())
            .max()
            .unwrap_or(0)
            .max("NAME".len());
        let _ = writeln!(
            out,
            "{:<name_width$}  {:<6}  {:>12}  {:>14}  SOURCE",
            "NAME", "MODE", "ENTRIES", "BYTES"
        );
        for c in &self.collections {
            let entries = c
                .entries
                .map_or_else(|| "-".to_string(), |n| n.to_string());
            let remote = if c.remote { " (remote)" } else { "" };
            let _ = writeln!(
                out,
                "{:<name_width$}  {:<6}  {:>12}  {:>14}  {}{}",
                c.name,
                c.mode.as_str(),
                entries,
                c.size_bytes,
                c.source,
                remote
            );
        }

        let s = &self.stats;
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "requests {}, lookups {}: found {}, not found {}, unknown collection {}, failed {}",
            s.requests, s.lookups, s.found, s.not_found, s.unknown_collection, s.failed
        );
        out
    }
}
