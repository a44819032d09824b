//! Error types for the hfserve server.
//!
//! Collection loading errors come from `hfserve_registry` and are carried
//! unchanged inside [`ServerError::Startup`].

use hfserve_registry::{FetchError, SpecError, StartupError};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Collection sources are missing or conflicting
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Missing required configuration value
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Remote cache directory cannot be used
    #[error("Remote cache directory {path} is unusable: {source}")]
    CacheDirectory {
        /// Configured directory
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Remote store endpoint is invalid
    #[error("Invalid remote store: {0}")]
    RemoteStore(#[source] FetchError),
}

/// Server runtime errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind HTTP server
    #[error("Failed to bind HTTP server to {addr}: {source}")]
    HttpBindFailed {
        /// Address that failed to bind
        addr: std::net::SocketAddr,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A collection could not be loaded
    #[error("Startup failed: {0}")]
    Startup(#[from] StartupError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server shutdown error
    #[error("Server shutdown error: {0}")]
    Shutdown(String),
}
