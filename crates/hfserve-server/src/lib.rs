//! hfserve server.
//!
//! Serves the collections of an `hfserve_registry` registry over HTTP:
//! - `config`: command-line and environment configuration
//! - `server`: startup orchestration and shared state
//! - `rpc`: JSON wire format of the lookup RPC
//! - `http`: axum router and handlers
//! - `introspection`: operator status page and document
//!
//! # Example
//!
//! ```no_run
//! use hfserve_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_args();
//!     config.validate()?;
//!
//!     let server = Server::new(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod error;
pub mod http;
pub mod introspection;
pub mod rpc;
pub mod server;

pub use config::ServerConfig;
pub use error::{ConfigError, ServerError};
pub use introspection::{CollectionInfo, StatusReport};
pub use rpc::{LookupRequest, LookupResponse, WireBytes, WireLookup, WireOutcome};
pub use server::{AppState, Server};
