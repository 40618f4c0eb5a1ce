//! HTTP fetch client for station pages and playlists
//!
//! [`HttpFetcher`] wraps a `reqwest::Client` with an explicit timeout,
//! bounded retries on transport errors and an optional shared
//! [`ResponseCache`]. Non-success statuses are returned to the caller, who
//! decides whether to log and skip.
//!
//! # Example
//!
//! ```no_run
//! use wrradio::client::{Fetch, HttpFetcher};
//!
//! #[tokio::main]
//! async fn main() -> wrradio::Result<()> {
//!     let fetcher = HttpFetcher::builder().retries(2).build()?;
//!     let response = fetcher.fetch("http://example.com/").await?;
//!     println!("{} ({} bytes)", response.status, response.body.len());
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderName, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use wrcache::{CachedResponse, ResponseCache};

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("WebRadio/", env!("CARGO_PKG_VERSION"));

/// Default number of retries after a transport error
pub const DEFAULT_RETRIES: u32 = 1;

/// Base delay between retries, multiplied by the attempt number
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Status and body of a fetched resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
    /// True when the body was served from the response cache
    pub from_cache: bool,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn cached(entry: CachedResponse) -> Self {
        Self {
            status: entry.status,
            body: String::from_utf8_lossy(&entry.body).into_owned(),
            from_cache: true,
        }
    }
}

/// Fetch capability consumed by the crawler
///
/// Transport failures are errors; HTTP error statuses are not.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<FetchResponse>;
}

/// reqwest-backed fetcher with optional response cache
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    cache: Option<Arc<ResponseCache>>,
    retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with default settings and no cache
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder for configuring the fetcher
    pub fn builder() -> FetcherBuilder {
        FetcherBuilder::default()
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    async fn cached_entry(&self, uri: &str) -> Option<CachedResponse> {
        let cache = self.cache.as_ref()?;
        match cache.get(uri).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(uri, "Response cache read failed: {}", e);
                None
            }
        }
    }

    async fn send(&self, uri: &str, cached: Option<&CachedResponse>) -> Result<reqwest::Response> {
        let mut attempt = 0;
        loop {
            let mut request = self.client.get(uri);
            if let Some(entry) = cached {
                if let Some(etag) = &entry.etag {
                    request = request.header(IF_NONE_MATCH, etag);
                }
                if let Some(last_modified) = &entry.last_modified {
                    request = request.header(IF_MODIFIED_SINCE, last_modified);
                }
            }

            match request.send().await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(uri, attempt, "Fetch failed, retrying: {}", e);
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                Err(e) => return Err(Error::Http(e)),
            }
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, uri: &str) -> Result<FetchResponse> {
        let cached = self.cached_entry(uri).await;

        if let (Some(cache), Some(entry)) = (&self.cache, &cached) {
            if entry.is_fresh(cache.max_age()) {
                debug!(uri, "Served from cache");
                return Ok(FetchResponse::cached(entry.clone()));
            }
        }

        debug!(uri, "Fetching");
        let validators = cached.as_ref().filter(|c| c.has_validator());
        let response = self.send(uri, validators).await?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            if let (Some(cache), Some(entry)) = (&self.cache, cached) {
                debug!(uri, "Not modified, reusing cached body");
                if let Err(e) = cache.refresh(uri) {
                    warn!(uri, "Response cache refresh failed: {}", e);
                }
                return Ok(FetchResponse::cached(entry));
            }
        }

        let header = |name: HeaderName| {
            response
                .headers()
                .get(&name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let etag = header(ETAG);
        let last_modified = header(LAST_MODIFIED);

        let body = response.bytes().await?;

        if status.is_success() {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache
                    .put(uri, status.as_u16(), etag.as_deref(), last_modified.as_deref(), &body)
                    .await
                {
                    warn!(uri, "Response cache write failed: {}", e);
                }
            }
        }

        Ok(FetchResponse {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
            from_cache: false,
        })
    }
}

/// Builder for [`HttpFetcher`]
pub struct FetcherBuilder {
    client: Option<Client>,
    timeout: Duration,
    user_agent: String,
    proxy: Option<String>,
    retries: u32,
    retry_delay: Duration,
    cache: Option<Arc<ResponseCache>>,
}

impl Default for FetcherBuilder {
    fn default() -> Self {
        Self {
            client: None,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            cache: None,
        }
    }
}

impl FetcherBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client (timeout, user agent and proxy are then ignored)
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set a proxy URL
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Number of retries after a transport error
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Share a response cache
    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build the fetcher
    pub fn build(self) -> Result<HttpFetcher> {
        let client = if let Some(client) = self.client {
            client
        } else {
            let mut builder = Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout);

            if let Some(proxy_url) = &self.proxy {
                let proxy = reqwest::Proxy::all(proxy_url)
                    .map_err(|e| Error::configuration(format!("Invalid proxy: {}", e)))?;
                builder = builder.proxy(proxy);
            }

            builder.build()?
        };

        Ok(HttpFetcher {
            client,
            cache: self.cache,
            retries: self.retries,
            retry_delay: self.retry_delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_range() {
        let ok = FetchResponse {
            status: 204,
            body: String::new(),
            from_cache: false,
        };
        assert!(ok.is_success());
        let missing = FetchResponse { status: 404, ..ok.clone() };
        assert!(!missing.is_success());
        let moved = FetchResponse { status: 301, ..ok };
        assert!(!moved.is_success());
    }
}
