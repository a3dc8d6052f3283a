//! Page fetching
//!
//! [`Fetcher`] is the seam the fetch stage talks to; [`HttpFetcher`] is the
//! reqwest-backed implementation used by the worker binary.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, instrument};

/// Fetch errors
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum FetchError {
    /// Request or body read exceeded the timeout
    #[error("request timed out")]
    Timeout,

    /// Connection, TLS or protocol failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Body could not be read
    #[error("body error: {0}")]
    Body(String),
}

/// Raw response of a fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// URL after redirects
    pub final_url: String,

    /// HTTP status code
    pub status: u16,

    /// Content type header, if any
    pub content_type: Option<String>,

    /// Response body
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the content type looks like HTML (missing header counts as HTML)
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("html"))
            .unwrap_or(true)
    }
}

/// Retrieves page content for a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// HTTP fetcher built on reqwest
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with the given request timeout and user agent
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_body() || err.is_decode() {
        FetchError::Body(err.to_string())
    } else {
        FetchError::Transport(err.to_string())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self.client.get(url).send().await.map_err(classify)?;

        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.bytes().await.map_err(classify)?.to_vec();

        debug!(status, bytes = body.len(), "Fetched page");

        Ok(FetchedPage {
            final_url,
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(status: u16, content_type: Option<&str>) -> FetchedPage {
        FetchedPage {
            final_url: "https://a.test/".into(),
            status,
            content_type: content_type.map(String::from),
            body: vec![],
        }
    }

    #[test]
    fn test_is_success() {
        assert!(page(200, None).is_success());
        assert!(page(204, None).is_success());
        assert!(!page(301, None).is_success());
        assert!(!page(404, None).is_success());
    }

    #[test]
    fn test_is_html() {
        assert!(page(200, Some("text/html; charset=utf-8")).is_html());
        assert!(page(200, Some("application/XHTML+xml")).is_html());
        assert!(page(200, None).is_html());
        assert!(!page(200, Some("image/png")).is_html());
    }

    #[test]
    fn test_http_fetcher_builds() {
        assert!(HttpFetcher::new(Duration::from_secs(5), "crawler-test").is_ok());
    }
}
