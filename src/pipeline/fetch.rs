use super::BoxError;
use anyhow::{Context, Result};
use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, TLS, timeout).
    Transport { url: String, source: BoxError },
    /// The server answered with anything other than `200 OK`.
    Status { url: String, status: u16 },
    /// The response arrived but its body could not be read.
    Body { url: String, source: BoxError },
    /// The worker's cancellation token fired while the request was in flight.
    Cancelled { url: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Transport { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Body { url, .. }
            | FetchError::Cancelled { url } => url,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Transport { url, source } => write!(f, "failed to download {url}: {source}"),
            FetchError::Status { url, status } => write!(f, "bad status code: {status} for {url}"),
            FetchError::Body { url, source } => {
                write!(f, "failed to read response body from {url}: {source}")
            }
            FetchError::Cancelled { url } => write!(f, "download of {url} cancelled"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Transport { source, .. } | FetchError::Body { source, .. } => {
                Some(source.as_ref())
            }
            FetchError::Status { .. } | FetchError::Cancelled { .. } => None,
        }
    }
}

/// Retrieves the raw payload behind a locator.
///
/// Implementations must return promptly with [`FetchError::Cancelled`] once `shutdown` fires.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        shutdown: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Bytes, FetchError>>;
}

/// HTTP GET fetcher backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get(&self, url: &str) -> Result<Bytes, FetchError> {
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|err| FetchError::Transport {
                    url: url.to_owned(),
                    source: Box::new(err),
                })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|err| FetchError::Body {
            url: url.to_owned(),
            source: Box::new(err),
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        shutdown: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => Err(FetchError::Cancelled { url: url.to_owned() }),
                result = self.get(url) => result,
            }
        })
    }
}
