//! HTTP GET with connect/read timeouts. One attempt, no retries.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};

use crate::error::HttpError;

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub connect_timeout_ms: u64,
    /// Applies to each read of the response, not the whole transfer.
    pub read_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 15_000,
            read_timeout_ms: 10_000,
            user_agent: concat!("book-listing/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Shared HTTP client. Cloning is cheap and clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(opts: &HttpOptions) -> Result<Self, HttpError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(opts.connect_timeout_ms))
            .read_timeout(Duration::from_millis(opts.read_timeout_ms))
            .user_agent(opts.user_agent.clone())
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// GET `url` and return the body. Only status 200 counts as success.
    ///
    /// The response is dropped on every path out of this function, which
    /// returns its connection to the pool (or closes it mid-body). Dropping
    /// the future itself, e.g. by aborting the owning task, does the same.
    pub async fn get(&self, url: &str) -> Result<Bytes, HttpError> {
        let parsed = Url::parse(url).map_err(|e| HttpError::MalformedUrl {
            url: url.to_string(),
            detail: e.to_string(),
        })?;
        self.get_url(parsed).await
    }

    pub async fn get_url(&self, url: Url) -> Result<Bytes, HttpError> {
        let transport = |e: reqwest::Error| HttpError::Transport {
            url: url.to_string(),
            detail: e.to_string(),
        };

        let response = self.client.get(url.clone()).send().await.map_err(transport)?;
        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(url = %url, status = status.as_u16(), "error response code");
            return Err(HttpError::BadStatus(status.as_u16()));
        }
        let body = response.bytes().await.map_err(transport)?;
        tracing::debug!(url = %url, bytes = body.len(), "fetched");
        Ok(body)
    }

    /// GET `url` and decode the body as UTF-8, replacing invalid sequences.
    pub async fn get_text(&self, url: Url) -> Result<String, HttpError> {
        let body = self.get_url(url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}
