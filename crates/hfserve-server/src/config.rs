//! Server configuration management.
//!
//! Flags are parsed once into an immutable [`ServerConfig`], which is then
//! turned into the values the registry needs ([`SpecSource`],
//! [`ResolveOptions`], [`RemoteCache`]). Every flag can also be set through
//! an `HFSERVE_*` environment variable.
//!
//! # Example
//!
//! ```no_run
//! use hfserve_server::ServerConfig;
//!
//! let config = ServerConfig::from_args();
//! config.validate().expect("Invalid configuration");
//!
//! println!("Listening on {}", config.listen_addr());
//! ```

use crate::error::ConfigError;
use clap::{ArgAction, Parser};
use hfserve_registry::{
    CachePolicy, RemoteCache, RemoteCacheConfig, ResolveOptions, RetryPolicy, SpecSource,
    WebHdfsStore,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

/// Server configuration loaded from CLI args and environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hfserve",
    about = "Serve immutable key/value collections over HTTP",
    long_about = "Serve immutable key/value collections over HTTP.\n\n\
        Collections given as 'name=path' are mapped and locked into memory; \
        'name@path' collections are served directly off disk.\n\n\
        Locking may require raising the locked-memory limit ('ulimit -Hl' and 'ulimit -Sl').",
    version
)]
pub struct ServerConfig {
    /// Collections to serve, as 'name=path' (locked in memory) or 'name@path' (from disk)
    #[arg(value_name = "SPECS")]
    pub specs: Vec<String>,

    /// Whitespace-separated specs, used when no positional spec is given
    #[arg(long = "specs-list", env = "HFSERVE_SPECS", value_name = "SPECS", hide = true)]
    pub specs_list: Option<String>,

    /// Listen port
    #[arg(long, env = "HFSERVE_PORT", default_value_t = 9999)]
    pub port: u16,

    /// Listen address
    #[arg(long, env = "HFSERVE_BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Print debug output
    #[arg(long, env = "HFSERVE_DEBUG", action = ArgAction::SetTrue)]
    pub debug: bool,

    /// Lock every collection into memory, ignoring '=' vs '@'
    #[arg(long, alias = "mlock-all", env = "HFSERVE_MEM", action = ArgAction::SetTrue)]
    pub mem: bool,

    /// URL or path of a JSON collection configuration document
    #[arg(long = "config-json", env = "HFSERVE_CONFIG_JSON", value_name = "URL")]
    pub config_json: Option<String>,

    /// Remote store (WebHDFS name node) address, e.g. 'namenode:9870'
    #[arg(long, alias = "hdfs", env = "HFSERVE_REMOTE", value_name = "ADDR")]
    pub remote: Option<String>,

    /// Path prefix marking a collection that must be fetched from the remote store
    #[arg(long, alias = "hdfs-prefix", env = "HFSERVE_REMOTE_PREFIX")]
    pub remote_prefix: Option<String>,

    /// Local directory for fetched files (never cleaned up automatically)
    #[arg(
        long,
        alias = "hdfs-cache",
        env = "HFSERVE_REMOTE_CACHE",
        default_value = "/tmp"
    )]
    pub remote_cache: PathBuf,

    /// Whether an existing cache file is reused or fetched again
    #[arg(
        long,
        env = "HFSERVE_CACHE_POLICY",
        value_parser = parse_cache_policy,
        default_value = "refetch"
    )]
    pub cache_policy: CachePolicy,

    /// Retries after a transient remote fetch failure
    #[arg(long, env = "HFSERVE_FETCH_RETRIES", default_value_t = 3)]
    pub fetch_retries: u32,

    /// User name sent to the remote store
    #[arg(long, env = "HFSERVE_REMOTE_USER")]
    pub remote_user: Option<String>,
}

fn parse_cache_policy(value: &str) -> Result<CachePolicy, String> {
    match value.to_ascii_lowercase().as_str() {
        "reuse" => Ok(CachePolicy::Reuse),
        "refetch" => Ok(CachePolicy::Refetch),
        other => Err(format!("expected 'reuse' or 'refetch', got '{other}'")),
    }
}

impl ServerConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Address the HTTP server binds to.
    #[must_use]
    pub const fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Default log filter when `RUST_LOG` is not set.
    #[must_use]
    pub const fn log_filter(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }

    /// Spec tokens from the command line, or else from `HFSERVE_SPECS`.
    ///
    /// Positional tokens are taken verbatim, so a path may contain spaces.
    #[must_use]
    pub fn spec_tokens(&self) -> Vec<String> {
        match &self.specs_list {
            Some(list) if self.specs.is_empty() => {
                list.split_whitespace().map(str::to_string).collect()
            }
            _ => self.specs.clone(),
        }
    }

    /// Where collection specs come from.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Spec` when both or neither of positional specs
    /// and a configuration document were given.
    pub fn spec_source(&self) -> Result<SpecSource, ConfigError> {
        Ok(SpecSource::from_inputs(
            self.spec_tokens(),
            self.config_json.clone(),
        )?)
    }

    /// Options applied to every resolved spec.
    #[must_use]
    pub const fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            force_lock: self.mem,
        }
    }

    /// Remote cache settings, when a remote prefix is configured.
    #[must_use]
    pub fn remote_cache_config(&self) -> Option<RemoteCacheConfig> {
        let prefix = self.remote_prefix.as_ref().filter(|p| !p.is_empty())?;
        Some(RemoteCacheConfig {
            prefix: prefix.clone(),
            cache_dir: self.remote_cache.clone(),
            policy: self.cache_policy,
        })
    }

    /// Build the remote cache backed by a WebHDFS store.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a prefix is set without a remote address, or
    /// the address is not a usable endpoint.
    pub fn remote_cache(&self) -> Result<Option<RemoteCache>, ConfigError> {
        let Some(cache_config) = self.remote_cache_config() else {
            return Ok(None);
        };
        let address = self.remote.as_deref().ok_or_else(|| {
            ConfigError::MissingRequired("--remote is required when --remote-prefix is set".into())
        })?;

        let mut store = WebHdfsStore::new(address)
            .map_err(ConfigError::RemoteStore)?
            .with_retry_policy(RetryPolicy::default().with_max_attempts(self.fetch_retries));
        if let Some(user) = &self.remote_user {
            store = store.with_user(user.clone());
        }

        Ok(Some(RemoteCache::new(cache_config, Arc::new(store))))
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - both or neither of positional specs and `--config-json` are given
    /// - `--remote-prefix` is set without `--remote`
    /// - the remote cache directory does not exist and cannot be created
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.spec_source()?;

        if self.remote_cache_config().is_some() {
            if self.remote.is_none() {
                return Err(ConfigError::MissingRequired(
                    "--remote is required when --remote-prefix is set".to_string(),
                ));
            }

            std::fs::create_dir_all(&self.remote_cache).map_err(|source| {
                ConfigError::CacheDirectory {
                    path: self.remote_cache.clone(),
                    source,
                }
            })?;
        } else if self.remote.is_some() {
            tracing::warn!(
                "--remote is set without --remote-prefix; no collection will be fetched"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use hfserve_registry::{ResidencyMode, SpecError};

    fn parse(args: &[&str]) -> ServerConfig {
        let mut argv = vec!["hfserve"];
        argv.extend_from_slice(args);
        ServerConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["users=/data/users.hfst"]);
        assert_eq!(config.port, 9999);
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:9999");
        assert_eq!(config.remote_cache, PathBuf::from("/tmp"));
        assert_eq!(config.cache_policy, CachePolicy::Refetch);
        assert_eq!(config.fetch_retries, 3);
        assert_eq!(config.log_filter(), "info");
        assert!(!config.resolve_options().force_lock);
        assert!(config.remote_cache_config().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_legacy_flag_names() {
        let config = parse(&[
            "--mlock-all",
            "--hdfs",
            "namenode:9870",
            "--hdfs-prefix",
            "/hdfs/",
            "--hdfs-cache",
            "/var/cache/hfserve",
            "a=/hdfs/a.hfst",
        ]);
        assert!(config.mem);
        assert_eq!(config.remote.as_deref(), Some("namenode:9870"));

        let cache = config.remote_cache_config().unwrap();
        assert_eq!(cache.prefix, "/hdfs/");
        assert_eq!(cache.cache_dir, PathBuf::from("/var/cache/hfserve"));
    }

    #[test]
    fn test_specs_and_document_conflict() {
        let config = parse(&["--config-json", "http://cfg/collections.json", "a=/a"]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Spec(SpecError::ConflictingSources))
        ));
    }

    #[test]
    fn test_no_collections() {
        let config = parse(&[]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Spec(SpecError::NoCollections))
        ));
    }

    #[test]
    fn test_prefix_requires_remote() {
        let config = parse(&["--remote-prefix", "/hdfs/", "a=/hdfs/a"]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
        assert!(config.remote_cache().is_err());
    }

    #[test]
    fn test_cache_policy_parsing() {
        let config = parse(&["--cache-policy", "Reuse", "a=/a"]);
        assert_eq!(config.cache_policy, CachePolicy::Reuse);

        let result = ServerConfig::try_parse_from(["hfserve", "--cache-policy", "sometimes", "a=/a"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_positional_spec_keeps_spaces() {
        let config = parse(&["a@/data/my file.hfst", "b=/data/b.hfst"]);
        assert_eq!(config.spec_tokens(), vec!["a@/data/my file.hfst", "b=/data/b.hfst"]);

        let SpecSource::Tokens(tokens) = config.spec_source().unwrap() else {
            panic!("expected command-line tokens");
        };
        let specs = hfserve_registry::spec::parse_tokens(&tokens).unwrap();
        assert_eq!(specs[0].source, "/data/my file.hfst");
        assert_eq!(specs[0].mode, ResidencyMode::Disk);
        assert_eq!(specs[1].mode, ResidencyMode::Locked);
    }

    #[test]
    fn test_specs_list_is_split_on_whitespace() {
        let config = parse(&["--specs-list", "a=/data/a.hfst  b@/data/b.hfst"]);
        assert_eq!(config.spec_tokens(), vec!["a=/data/a.hfst", "b@/data/b.hfst"]);

        let config = parse(&["--specs-list", "a=/data/a.hfst", "c@/data/c.hfst"]);
        assert_eq!(config.spec_tokens(), vec!["c@/data/c.hfst"]);
    }

    #[test]
    fn test_debug_and_mem() {
        let config = parse(&["--debug", "--mem", "a@/a"]);
        assert_eq!(config.log_filter(), "debug");
        assert!(config.resolve_options().force_lock);
    }
}
