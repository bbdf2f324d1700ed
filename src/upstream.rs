//! Upstream cat image API client.
//!
//! [`ImageSource`] is the seam the ingestion pipeline calls through; the
//! production implementation [`CatApiClient`] talks to a TheCatAPI-style
//! service:
//!
//! ```text
//! GET {base_url}/images/search?limit=25&has_breeds=1
//! x-api-key: <key>
//! ```
//!
//! The query is fixed configuration. There is no retry or backoff: a failed
//! call surfaces immediately as an [`UpstreamError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use thiserror::Error;

use cat_harvest_core::models::Candidate;

use crate::config::UpstreamConfig;

/// Header carrying the static API key.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection, TLS, DNS or timeout failure.
    #[error("upstream request failed: {0}")]
    Transport(String),

    /// The upstream answered with a non-success status.
    #[error("upstream returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// The configured API key cannot be sent as an HTTP header value.
    #[error("upstream API key is not a valid header value: {0}")]
    InvalidApiKey(String),

    /// The response body was not the expected JSON shape.
    #[error("upstream response could not be decoded: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return UpstreamError::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            };
        }
        if err.is_decode() {
            return UpstreamError::Decode(err.to_string());
        }
        UpstreamError::Transport(err.to_string())
    }
}

/// Source of candidate cats and their image bytes.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Fetches one batch of candidates.
    async fn search(&self) -> Result<Vec<Candidate>, UpstreamError>;

    /// Downloads the bytes behind an image URL.
    async fn download(&self, url: &str) -> Result<Vec<u8>, UpstreamError>;
}

/// reqwest-backed client for a TheCatAPI-compatible service.
pub struct CatApiClient {
    client: reqwest::Client,
    search_url: String,
    limit: u32,
}

impl CatApiClient {
    /// Builds the client once. The API key (if any) is installed as a
    /// default header and never changes for the lifetime of the client.
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let mut value =
                HeaderValue::from_str(key).map_err(|e| UpstreamError::InvalidApiKey(e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            search_url: format!("{}/images/search", config.base_url.trim_end_matches('/')),
            limit: config.limit,
        })
    }

    pub fn search_url(&self) -> &str {
        &self.search_url
    }
}

#[async_trait]
impl ImageSource for CatApiClient {
    async fn search(&self) -> Result<Vec<Candidate>, UpstreamError> {
        let response = self
            .client
            .get(&self.search_url)
            .query(&[("limit", self.limit), ("has_breeds", 1)])
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, UpstreamError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}
