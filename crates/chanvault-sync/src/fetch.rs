//! HTTP fetch capability for the downloader.
//!
//! The downloader is the only point in the engine that performs network
//! I/O, and it does so through the [`Fetcher`] trait so tests (and hosts
//! with their own HTTP stack) can substitute an implementation.

use async_trait::async_trait;

use chanvault_core::{Error, Result};

/// A successfully fetched response body.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    /// Media type from the `Content-Type` header, lowercased with any
    /// parameters stripped. `None` if the header was absent.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Injected HTTP fetch capability.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a URL.
    ///
    /// Returns `Ok(None)` for a non-success status (the task is dropped,
    /// not retried) and `Err` for transport failures.
    async fn fetch(&self, url: &str) -> Result<Option<FetchedBody>>;
}

/// Production fetcher backed by `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("chanvault/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<FetchedBody>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            tracing::debug!("Non-success status {} for {}", response.status(), url);
            return Ok(None);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(normalize_media_type);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?
            .to_vec();

        Ok(Some(FetchedBody {
            content_type,
            bytes,
        }))
    }
}

/// Strip parameters (`; charset=...`) and lowercase the media type.
fn normalize_media_type(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or(header)
        .trim()
        .to_ascii_lowercase()
}
