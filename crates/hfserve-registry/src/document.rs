//! JSON configuration document loading.
//!
//! The document is a JSON array of records equivalent to the command-line
//! form:
//!
//! ```json
//! [
//!   {"name": "users", "path": "/data/users.hfst", "mlock": true},
//!   {"name": "venues", "path": "/hdfs/venues.hfst", "mode": "mapped"}
//! ]
//! ```
//!
//! `mlock` selects `Locked` or `Disk`; an explicit `mode` wins over it.

use crate::error::SpecError;
use crate::spec::{CollectionSpec, ResidencyMode};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const DOCUMENT_TIMEOUT: Duration = Duration::from_secs(30);

/// One record of the configuration document.
#[derive(Debug, Clone, Deserialize)]
struct SpecRecord {
    #[serde(alias = "Name")]
    name: String,

    #[serde(alias = "Path", alias = "location")]
    path: String,

    #[serde(default, alias = "Mlock")]
    mlock: bool,

    #[serde(default, alias = "Mode")]
    mode: Option<ResidencyMode>,
}

impl SpecRecord {
    fn into_spec(self, index: usize) -> Result<CollectionSpec, SpecError> {
        if self.name.is_empty() {
            return Err(SpecError::EmptyField {
                index,
                field: "name",
            });
        }
        if self.path.is_empty() {
            return Err(SpecError::EmptyField {
                index,
                field: "path",
            });
        }

        let mode = self.mode.unwrap_or(if self.mlock {
            ResidencyMode::Locked
        } else {
            ResidencyMode::Disk
        });

        Ok(CollectionSpec::new(self.name, self.path, mode))
    }
}

/// Parse a configuration document body.
pub fn parse(body: &[u8]) -> Result<Vec<CollectionSpec>, SpecError> {
    let records: Vec<SpecRecord> = serde_json::from_slice(body)?;
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| record.into_spec(index))
        .collect()
}

/// Load a configuration document from an http(s) URL, a `file://` URL or a
/// plain local path.
pub async fn load(location: &str) -> Result<Vec<CollectionSpec>, SpecError> {
    let body = match url::Url::parse(location) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => fetch(location).await?,
        Ok(url) if url.scheme() == "file" => {
            let path = url
                .to_file_path()
                .unwrap_or_else(|()| PathBuf::from(url.path()));
            read_local(path).await?
        }
        _ => read_local(PathBuf::from(location)).await?,
    };

    let specs = parse(&body)?;
    info!(
        "Loaded {} collection specs from configuration document {}",
        specs.len(),
        location
    );
    Ok(specs)
}

async fn fetch(url: &str) -> Result<Vec<u8>, SpecError> {
    let fetch_error = |source| SpecError::DocumentFetch {
        url: url.to_string(),
        source,
    };

    crate::install_crypto_provider();
    let client = reqwest::Client::builder()
        .timeout(DOCUMENT_TIMEOUT)
        .build()
        .map_err(fetch_error)?;

    let response = client.get(url).send().await.map_err(fetch_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(SpecError::DocumentStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(response.bytes().await.map_err(fetch_error)?.to_vec())
}

async fn read_local(path: PathBuf) -> Result<Vec<u8>, SpecError> {
    tokio::fs::read(&path)
        .await
        .map_err(|source| SpecError::DocumentRead { path, source })
}
