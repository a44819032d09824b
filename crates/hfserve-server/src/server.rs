//! Server state management and orchestration.
//!
//! The registry is fully built before [`AppState`] exists, and the HTTP
//! listener is only bound once the state is ready, so no request can ever
//! observe a partially loaded registry.

use crate::config::ServerConfig;
use crate::error::ServerError;
use hfserve_registry::{LookupService, Registry, RegistryLoader, StartupError};
use std::sync::Arc;
use std::time::SystemTime;

/// Shared application state for HTTP handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Lookup service over the published registry
    service: LookupService,

    /// Server start time
    started_at: SystemTime,
}

impl AppState {
    /// Wrap an already built registry.
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self {
            service: LookupService::new(Arc::new(registry)),
            started_at: SystemTime::now(),
        }
    }

    /// Resolve specs, fetch remote collections and build the registry.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` on the first collection that fails to load.
    pub async fn load(config: &ServerConfig) -> Result<Self, ServerError> {
        let source = config.spec_source()?;
        let specs = source
            .resolve(&config.resolve_options())
            .await
            .map_err(StartupError::from)?;

        tracing::info!("Loading {} collections...", specs.len());

        let mut loader = RegistryLoader::new();
        if let Some(remote) = config.remote_cache()? {
            tracing::info!(
                "Fetching collections under '{}' into {}",
                remote.config().prefix,
                remote.config().cache_dir.display()
            );
            loader = loader.with_remote(remote);
        }

        let registry = loader.build(&specs).await?;
        Ok(Self::new(registry))
    }

    /// Get reference to the lookup service.
    #[must_use]
    pub const fn service(&self) -> &LookupService {
        &self.service
    }

    /// Get reference to the published registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        self.service.registry()
    }

    /// Get server uptime in seconds.
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.started_at)
            .unwrap_or_default()
            .as_secs()
    }
}

/// Server orchestration.
pub struct Server {
    /// Shared application state
    state: Arc<AppState>,
    /// Server configuration
    config: ServerConfig,
}

impl Server {
    /// Create new server with configuration.
    ///
    /// Loads every collection before returning.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if any collection cannot be loaded.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let state = AppState::load(&config).await?;

        tracing::info!(
            "Server initialized with {} collections: {}",
            state.registry().len(),
            state.registry().names().join(", ")
        );

        Ok(Self {
            state: Arc::new(state),
            config,
        })
    }

    /// Shared application state.
    #[must_use]
    pub const fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Run the HTTP server until interrupted.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if binding fails or the server stops with an error.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.listen_addr();
        tracing::info!("Serving on http://{}/", addr);

        crate::http::start_server(addr, self.state, shutdown_signal()).await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;
    use hfserve_registry::{ResidencyMode, TableWriter};
    use tempfile::TempDir;

    fn write_table(dir: &TempDir, name: &str) -> String {
        let mut writer = TableWriter::new();
        writer.insert("k", "v").unwrap();
        let path = dir.path().join(name);
        writer.write_file(&path).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_app_state_load() {
        let dir = TempDir::new().unwrap();
        let a = write_table(&dir, "a.hfst");
        let spec = format!("a@{a}");
        let config = ServerConfig::try_parse_from(["hfserve", spec.as_str()]).unwrap();

        let state = AppState::load(&config).await.unwrap();
        assert_eq!(state.registry().names(), vec!["a"]);
        assert_eq!(
            state.registry().lookup("a").unwrap().mode(),
            ResidencyMode::Disk
        );
        assert_eq!(state.uptime_seconds(), 0);
    }

    #[tokio::test]
    async fn test_app_state_load_fails_on_missing_file() {
        let config = ServerConfig::try_parse_from(["hfserve", "a@/nonexistent/a.hfst"]).unwrap();
        let result = AppState::load(&config).await;
        assert!(matches!(
            result,
            Err(ServerError::Startup(StartupError::Residency { .. }))
        ));
    }
}
