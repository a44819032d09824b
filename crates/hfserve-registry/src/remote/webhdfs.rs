//! WebHDFS remote store.
//!
//! Files are read with `GET {endpoint}/webhdfs/v1{path}?op=OPEN`; the name
//! node answers with a redirect to a data node, which reqwest follows.

use super::{RemoteStore, RetryPolicy};
use crate::error::FetchError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Remote store speaking the WebHDFS REST protocol.
#[derive(Debug, Clone)]
pub struct WebHdfsStore {
    client: Client,
    endpoint: Url,
    user: Option<String>,
    retry_policy: RetryPolicy,
}

impl WebHdfsStore {
    /// Create a store for the name node at `address`.
    ///
    /// `address` may be a bare `host:port` (http is assumed) or a full URL.
    pub fn new(address: &str) -> Result<Self, FetchError> {
        crate::install_crypto_provider();

        let endpoint = if address.contains("://") {
            Url::parse(address)
        } else {
            Url::parse(&format!("http://{address}"))
        }
        .map_err(|e| FetchError::InvalidEndpoint(format!("{address}: {e}")))?;

        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .read_timeout(Duration::from_secs(60))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("hfserve/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                FetchError::InvalidEndpoint(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint,
            user: None,
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Issue requests as `user` (`user.name` query parameter).
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Name node endpoint.
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build the `op=OPEN` URL for a remote location.
    ///
    /// `hdfs://` and `webhdfs://` URLs contribute their path; anything else
    /// is taken as an absolute HDFS path.
    pub fn open_url(&self, location: &str) -> Result<Url, FetchError> {
        let path = match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "hdfs" | "webhdfs") => url.path().to_string(),
            _ if location.starts_with('/') => location.to_string(),
            _ => format!("/{location}"),
        };

        let base = self.endpoint.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/webhdfs/v1{path}"))
            .map_err(|e| FetchError::InvalidEndpoint(format!("{location}: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("op", "OPEN");
            if let Some(user) = &self.user {
                query.append_pair("user.name", user);
            }
        }

        Ok(url)
    }

    async fn fetch_once(
        &self,
        location: &str,
        url: &Url,
        destination: &Path,
    ) -> Result<u64, FetchError> {
        let http_error = |source| FetchError::Http {
            location: location.to_string(),
            source,
        };
        let io_error = |source| FetchError::Io {
            path: destination.to_path_buf(),
            source,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(http_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(FetchError::NotFound {
                    location: location.to_string(),
                });
            }
            status if !status.is_success() => {
                return Err(FetchError::Status {
                    location: location.to_string(),
                    status: status.as_u16(),
                });
            }
            _ => {}
        }

        let expected = response.content_length();
        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(io_error)?;
        let mut received = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(http_error)?;
            file.write_all(&chunk).await.map_err(io_error)?;
            received += chunk.len() as u64;
        }

        file.flush().await.map_err(io_error)?;
        file.sync_all().await.map_err(io_error)?;

        if let Some(expected) = expected
            && expected != received
        {
            return Err(FetchError::Truncated {
                location: location.to_string(),
                expected,
                received,
            });
        }

        Ok(received)
    }
}

#[async_trait]
impl RemoteStore for WebHdfsStore {
    async fn fetch(&self, location: &str, destination: &Path) -> Result<(), FetchError> {
        let url = self.open_url(location)?;
        tracing::debug!("Requesting {}", url);

        let bytes = self
            .retry_policy
            .execute(|| self.fetch_once(location, &url, destination))
            .await?;

        tracing::info!("Fetched {} ({} bytes)", location, bytes);
        Ok(())
    }
}
