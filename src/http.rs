//! HTTP access to the remote uploads origin.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;

/// Result of a probe or a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// HTTP 200. Carries the number of body bytes written to disk (zero for probes).
    Ok(u64),
    /// The request never produced a complete response (DNS, refused, timeout, broken body).
    TransportError(String),
    /// The server answered with a status other than 200.
    HttpError(u16),
}

impl FetchOutcome {
    /// Whether the request succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Minimal HTTP surface used by the sync engine.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issues a HEAD request.
    async fn head(&self, url: &str, timeout: Duration) -> FetchOutcome;

    /// Issues a GET request and streams a 200 body into `dest`.
    ///
    /// Bodies of non-200 responses are not written.
    async fn get_to_file(&self, url: &str, dest: &Path, timeout: Duration) -> FetchOutcome;
}

/// Builds a configured HTTP client for the uploads origin.
pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("attachment-sync/", env!("CARGO_PKG_VERSION")))
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(8)
        .tcp_keepalive(Duration::from_secs(30))
        .build()
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Creates a client with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> crate::Result<Self> {
        Ok(Self {
            client: build_http_client()?,
        })
    }

    /// Wraps an existing `reqwest` client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn describe(error: &reqwest::Error, timeout: Duration) -> String {
    if error.is_timeout() {
        format!("operation timed out after {} seconds", timeout.as_secs())
    } else {
        error.to_string()
    }
}

async fn stream_to_file(response: reqwest::Response, dest: &Path) -> std::io::Result<u64> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut body = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(std::io::Error::other)?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn head(&self, url: &str, timeout: Duration) -> FetchOutcome {
        match self.client.head(url).timeout(timeout).send().await {
            Ok(response) if response.status() == StatusCode::OK => FetchOutcome::Ok(0),
            Ok(response) => FetchOutcome::HttpError(response.status().as_u16()),
            Err(e) => FetchOutcome::TransportError(describe(&e, timeout)),
        }
    }

    async fn get_to_file(&self, url: &str, dest: &Path, timeout: Duration) -> FetchOutcome {
        let response = match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::TransportError(describe(&e, timeout)),
        };

        if response.status() != StatusCode::OK {
            return FetchOutcome::HttpError(response.status().as_u16());
        }

        match stream_to_file(response, dest).await {
            Ok(bytes) => FetchOutcome::Ok(bytes),
            Err(e) => FetchOutcome::TransportError(e.to_string()),
        }
    }
}
