//! hfserve binary entry point.
//!
//! Parses configuration, initializes logging, loads every collection and
//! serves them. Any startup failure exits with a non-zero status before the
//! listener is bound.

use anyhow::Result;
use hfserve_server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_filter())),
        )
        .init();

    hfserve_registry::install_crypto_provider();

    tracing::info!(
        "hfserve starting: {} specs, config document {:?}, remote {:?}",
        config.spec_tokens().len(),
        config.config_json,
        config.remote
    );

    config.validate()?;

    let server = Server::new(config).await?;
    server.run().await?;

    Ok(())
}
