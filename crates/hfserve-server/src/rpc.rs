//! JSON wire format of the lookup RPC.
//!
//! Keys and values are arbitrary bytes and travel as standard base64
//! strings. A request is either a batch of `(collection, key)` pairs:
//!
//! ```json
//! {"lookups": [{"collection": "users", "key": "YWxpY2U="}]}
//! ```
//!
//! or several keys against one collection:
//!
//! ```json
//! {"collection": "users", "keys": ["YWxpY2U=", "Ym9i"]}
//! ```
//!
//! The response carries one result per requested key, in request order:
//!
//! ```json
//! {"results": [{"status": "found", "value": "MQ=="}, {"status": "not_found"}]}
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use hfserve_registry::{LookupOutcome, LookupPair};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// Binary payload carried as a base64 string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireBytes(pub Bytes);

impl AsRef<[u8]> for WireBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for WireBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }
}

impl Serialize for WireBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for WireBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(|bytes| Self(Bytes::from(bytes)))
            .map_err(|e| de::Error::custom(format!("invalid base64: {e}")))
    }
}

/// One `(collection, key)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireLookup {
    /// Collection name
    pub collection: String,
    /// Key
    pub key: WireBytes,
}

/// Lookup request body.
///
/// Exactly one form is accepted: `lookups` alone, or `collection` together
/// with `keys`. Unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, try_from = "RawLookupRequest")]
pub enum LookupRequest {
    /// Independent pairs, possibly across collections
    Batch {
        /// Pairs to resolve
        lookups: Vec<WireLookup>,
    },
    /// Several keys in one collection
    Collection {
        /// Collection name
        collection: String,
        /// Keys to resolve
        keys: Vec<WireBytes>,
    },
}

/// Request fields as they appear on the wire, before the form is chosen.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLookupRequest {
    lookups: Option<Vec<WireLookup>>,
    collection: Option<String>,
    keys: Option<Vec<WireBytes>>,
}

impl TryFrom<RawLookupRequest> for LookupRequest {
    type Error = String;

    fn try_from(raw: RawLookupRequest) -> Result<Self, Self::Error> {
        match (raw.lookups, raw.collection, raw.keys) {
            (Some(lookups), None, None) => Ok(Self::Batch { lookups }),
            (None, Some(collection), Some(keys)) => Ok(Self::Collection { collection, keys }),
            (Some(_), _, _) => {
                Err("'lookups' cannot be combined with 'collection' or 'keys'".to_string())
            }
            (None, Some(_), None) => Err("missing field 'keys'".to_string()),
            (None, None, Some(_)) => Err("missing field 'collection'".to_string()),
            (None, None, None) => {
                Err("expected 'lookups', or 'collection' with 'keys'".to_string())
            }
        }
    }
}

impl LookupRequest {
    /// Number of keys requested.
    pub fn len(&self) -> usize {
        match self {
            Self::Batch { lookups } => lookups.len(),
            Self::Collection { keys, .. } => keys.len(),
        }
    }

    /// Whether no keys are requested.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<WireLookup> for LookupPair {
    fn from(lookup: WireLookup) -> Self {
        Self::new(lookup.collection, lookup.key.0)
    }
}

/// Per-key result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WireOutcome {
    /// Key present
    Found {
        /// Stored value
        value: WireBytes,
    },
    /// Key absent
    NotFound,
    /// Collection not loaded
    UnknownCollection,
    /// Read failed
    Failed {
        /// Failure description
        message: String,
    },
}

impl From<LookupOutcome> for WireOutcome {
    fn from(outcome: LookupOutcome) -> Self {
        match outcome {
            LookupOutcome::Found(value) => Self::Found {
                value: WireBytes(value),
            },
            LookupOutcome::NotFound => Self::NotFound,
            LookupOutcome::UnknownCollection => Self::UnknownCollection,
            LookupOutcome::Failed(message) => Self::Failed { message },
        }
    }
}

/// Lookup response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResponse {
    /// One result per requested key, in request order
    pub results: Vec<WireOutcome>,
}

impl From<Vec<LookupOutcome>> for LookupResponse {
    fn from(outcomes: Vec<LookupOutcome>) -> Self {
        Self {
            results: outcomes.into_iter().map(WireOutcome::from).collect(),
        }
    }
}
