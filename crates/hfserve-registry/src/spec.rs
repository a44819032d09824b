//! Collection specs and their resolution.
//!
//! A spec names a collection, points at its file and says how the file
//! should be held in memory. Specs come from command-line tokens
//! (`name=path` locks the collection in memory, `name@path` serves it from
//! disk) or from a configuration document; the two sources are mutually
//! exclusive.

use crate::document;
use crate::error::SpecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// How a collection's bytes are held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidencyMode {
    /// Memory-mapped and pinned in physical memory
    Locked,
    /// Memory-mapped, pages may be evicted
    Mapped,
    /// Served with positioned reads, no mapping
    Disk,
}

impl ResidencyMode {
    /// Whether the file is memory-mapped in this mode.
    pub const fn is_mapped(self) -> bool {
        matches!(self, Self::Locked | Self::Mapped)
    }

    /// Lowercase name used in logs and introspection output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Mapped => "mapped",
            Self::Disk => "disk",
        }
    }
}

impl fmt::Display for ResidencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed declaration of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Collection name, unique within a registry
    pub name: String,
    /// Local path or remote location
    pub source: String,
    /// Requested residency
    pub mode: ResidencyMode,
}

impl CollectionSpec {
    /// Create a spec from its parts.
    pub fn new(name: impl Into<String>, source: impl Into<String>, mode: ResidencyMode) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            mode,
        }
    }

    /// Parse a `name=path` or `name@path` token.
    ///
    /// Exactly one occurrence of exactly one separator is accepted, and both
    /// sides must be non-empty.
    pub fn parse(token: &str) -> Result<Self, SpecError> {
        let malformed = |reason| SpecError::MalformedToken {
            token: token.to_string(),
            reason,
        };

        let (separator, mode) = match (token.contains('='), token.contains('@')) {
            (true, false) => ('=', ResidencyMode::Locked),
            (false, true) => ('@', ResidencyMode::Disk),
            (false, false) => return Err(malformed("expected 'name=path' or 'name@path'")),
            (true, true) => return Err(malformed("contains both '=' and '@'")),
        };

        if token.matches(separator).count() > 1 {
            return Err(malformed("separator appears more than once"));
        }

        let Some((name, source)) = token.split_once(separator) else {
            return Err(malformed("expected 'name=path' or 'name@path'"));
        };

        if name.is_empty() {
            return Err(malformed("empty collection name"));
        }
        if source.is_empty() {
            return Err(malformed("empty collection path"));
        }

        Ok(Self::new(name, source, mode))
    }
}

impl FromStr for CollectionSpec {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Options applied uniformly after specs are parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Force every collection to `Locked`, regardless of how it was declared
    pub force_lock: bool,
}

/// Where the collection specs come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    /// Command-line `name=path` / `name@path` tokens
    Tokens(Vec<String>),
    /// URL or path of a JSON configuration document
    Document(String),
}

impl SpecSource {
    /// Pick the spec source from the two mutually exclusive inputs.
    pub fn from_inputs(tokens: Vec<String>, document: Option<String>) -> Result<Self, SpecError> {
        match (tokens.is_empty(), document) {
            (false, Some(_)) => Err(SpecError::ConflictingSources),
            (true, Some(url)) => Ok(Self::Document(url)),
            (false, None) => Ok(Self::Tokens(tokens)),
            (true, None) => Err(SpecError::NoCollections),
        }
    }

    /// Parse or fetch the specs and apply `options`.
    pub async fn resolve(&self, options: &ResolveOptions) -> Result<Vec<CollectionSpec>, SpecError> {
        let specs = match self {
            Self::Tokens(tokens) => parse_tokens(tokens)?,
            Self::Document(location) => document::load(location).await?,
        };
        Ok(resolve(specs, options))
    }
}

/// Parse every token, failing on the first malformed one.
pub fn parse_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<CollectionSpec>, SpecError> {
    tokens
        .iter()
        .map(|token| CollectionSpec::parse(token.as_ref()))
        .collect()
}

/// Deduplicate specs by name and apply the force-lock override.
///
/// A repeated name keeps the position of its first declaration and the
/// contents of its last.
pub fn resolve(specs: Vec<CollectionSpec>, options: &ResolveOptions) -> Vec<CollectionSpec> {
    let mut resolved: Vec<CollectionSpec> = Vec::with_capacity(specs.len());

    for spec in specs {
        if let Some(existing) = resolved.iter_mut().find(|s| s.name == spec.name) {
            warn!(
                "Collection '{}' declared more than once, using {}",
                spec.name, spec.source
            );
            *existing = spec;
        } else {
            resolved.push(spec);
        }
    }

    if options.force_lock {
        for spec in &mut resolved {
            if spec.mode != ResidencyMode::Locked {
                debug!("Forcing {} to be locked in memory", spec.name);
                spec.mode = ResidencyMode::Locked;
            }
        }
    }

    resolved
}
