//! Stem acquisition
//!
//! Tracks reference remote audio by URL; the session pulls the raw
//! bytes through a [`TrackFetcher`] so hosts (and tests) can swap the
//! transport. Fetch failures propagate with no retry.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{Result, StemloopError};

/// Source of raw stem bytes
#[async_trait]
pub trait TrackFetcher: Send + Sync {
    /// Fetch the complete contents behind a URL
    async fn fetch(&self, name: &str, url: &str) -> Result<Bytes>;
}

/// HTTP fetcher backed by a shared reqwest client
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackFetcher for HttpFetcher {
    async fn fetch(&self, name: &str, url: &str) -> Result<Bytes> {
        let resp = self.client.get(url).send().await.map_err(|e| {
            warn!(track = name, url, "http fetch failed: {}", e);
            StemloopError::FetchFailed {
                name: name.to_string(),
                url: url.to_string(),
                reason: e.to_string(),
                source: Some(Box::new(e)),
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(track = name, url, status = status.as_u16(), "http fetch rejected");
            return Err(StemloopError::FetchFailed {
                name: name.to_string(),
                url: url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
                source: None,
            });
        }

        let bytes = resp.bytes().await.map_err(|e| StemloopError::FetchFailed {
            name: name.to_string(),
            url: url.to_string(),
            reason: format!("body read failed: {}", e),
            source: Some(Box::new(e)),
        })?;

        debug!(track = name, bytes = bytes.len(), "fetched stem");
        Ok(bytes)
    }
}

/// Directory-backed fetcher for tests and offline demos
///
/// Resolves each URL's final path segment against a local root, so a
/// manifest written for remote assets also works against a fixture
/// directory.
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let file_name = url
            .rsplit('/')
            .next()
            .and_then(|segment| segment.split('?').next())
            .unwrap_or(url);
        self.root.join(file_name)
    }
}

#[async_trait]
impl TrackFetcher for FileFetcher {
    async fn fetch(&self, name: &str, url: &str) -> Result<Bytes> {
        let path = self.resolve(url);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| StemloopError::FetchFailed {
                name: name.to_string(),
                url: url.to_string(),
                reason: format!("local read of {} failed: {}", path.display(), e),
                source: Some(Box::new(e)),
            })?;

        debug!(track = name, path = %path.display(), bytes = data.len(), "read stem fixture");
        Ok(Bytes::from(data))
    }
}
