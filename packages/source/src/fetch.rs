//! [`Fetcher`] implementations for remote and local sources.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    Fetcher, SourceError,
    retry::{self, RetryPolicy},
};

/// Per-request timeout. The main table is a ~30 MB gzip file.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Downloads payloads over HTTP with retry and backoff.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    /// Creates a fetcher with the default timeout and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("crimes-france/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            policy: RetryPolicy::default(),
        })
    }

    /// Overrides the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, SourceError> {
        log::info!("Downloading {location}");
        retry::download(&self.client, location, &self.policy).await
    }
}

/// Reads payloads from a local directory.
///
/// Relative locations resolve against the base directory; absolute paths
/// are read as-is.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    base_dir: PathBuf,
}

impl FileFetcher {
    /// Creates a fetcher rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// The directory relative locations resolve against.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, SourceError> {
        let path = self.resolve(location);
        log::info!("Reading {}", path.display());
        let bytes = tokio::fs::read(&path).await?;
        log::debug!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_fetcher_reads_relative_to_base_dir() {
        let dir = std::env::temp_dir().join(format!("crimes_france_fetch_{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("table.csv"), b"a;b\n1;2\n")
            .await
            .unwrap();

        let fetcher = FileFetcher::new(&dir);
        let bytes = fetcher.fetch("table.csv").await.unwrap();
        assert_eq!(bytes, b"a;b\n1;2\n");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_a_transport_error() {
        let fetcher = FileFetcher::new(std::env::temp_dir());
        let err = fetcher
            .fetch("crimes-france-does-not-exist.csv.gz")
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }
}
