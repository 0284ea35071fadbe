//! Long-lived HTTP client handle
//!
//! Outbound clients (vector store, inference backend, data sources) are
//! created on first use, rebuilt if they were closed, and closed explicitly
//! on shutdown so pooled connections are released.

use crate::errors::{AppError, Result};
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::sync::RwLock;

pub struct LazyClient {
    timeout: Duration,
    headers: HeaderMap,
    inner: RwLock<Option<reqwest::Client>>,
}

impl LazyClient {
    pub fn new(timeout: Duration) -> Self {
        Self::with_headers(timeout, HeaderMap::new())
    }

    pub fn with_headers(timeout: Duration, headers: HeaderMap) -> Self {
        Self {
            timeout,
            headers,
            inner: RwLock::new(None),
        }
    }

    /// Return the open client, establishing it if absent or closed
    pub async fn get(&self) -> Result<reqwest::Client> {
        if let Some(client) = self.inner.read().await.as_ref() {
            return Ok(client.clone());
        }

        let mut guard = self.inner.write().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .default_headers(self.headers.clone())
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        tracing::debug!(timeout_secs = self.timeout.as_secs(), "HTTP client established");
        *guard = Some(client.clone());
        Ok(client)
    }

    pub async fn is_open(&self) -> bool {
        self.inner.read().await.is_some()
    }

    /// Drop the pooled client; the next `get` re-establishes it
    pub async fn close(&self) {
        if self.inner.write().await.take().is_some() {
            tracing::debug!("HTTP client closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lazy_open_close_reopen() {
        let client = LazyClient::new(Duration::from_secs(5));
        assert!(!client.is_open().await);

        client.get().await.unwrap();
        assert!(client.is_open().await);

        client.close().await;
        assert!(!client.is_open().await);

        client.get().await.unwrap();
        assert!(client.is_open().await);
    }
}
