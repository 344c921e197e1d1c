//! URL fetching seam
//!
//! Workers fetch through the [`UrlFetcher`] trait so tests can inject
//! scripted transports. The production implementation wraps a shared
//! `reqwest` client with a per-request timeout.
//!
//! A fetcher reports transport-level failures only: any HTTP response,
//! whatever its status, is an `Ok` value. Status and body classification
//! belong to the worker.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, FetchError, Result};

/// Raw HTTP response as seen by a worker
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

/// Transport abstraction for fetching a single URL
#[async_trait]
pub trait UrlFetcher: Send + Sync {
    /// Fetch one URL, classifying transport failures
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] if the request exceeds the
    /// configured deadline, [`FetchError::Connection`] for everything that
    /// prevents an HTTP exchange (DNS, refused connection, invalid URL,
    /// interrupted body read).
    async fn fetch(&self, url: &str) -> std::result::Result<FetchResponse, FetchError>;
}

/// Production fetcher backed by a shared `reqwest::Client`
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Build a fetcher with the given per-request timeout
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the underlying HTTP client cannot be
    /// constructed (e.g., no TLS backend available).
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to build HTTP client: {e}"),
                key: None,
            })?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl UrlFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchResponse, FetchError> {
        // Reject lines that are not URLs before handing them to the client
        let parsed = url::Url::parse(url).map_err(|e| {
            tracing::debug!(url = %url, error = %e, "invalid URL");
            FetchError::Connection
        })?;

        let response = self
            .client
            .get(parsed)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(url = %url, error = %e, "transport failure");
                FetchError::from_transport(&e)
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            tracing::debug!(url = %url, error = %e, "failed to read response body");
            FetchError::from_transport(&e)
        })?;

        Ok(FetchResponse { status, body })
    }
}
