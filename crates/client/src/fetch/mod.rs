//! HTTP fetch layer used by the cache controller.
//!
//! ### URL Normalization
//! - Trim whitespace, accept only `http` and `https`
//! - Lowercase host, remove fragments
//! - Preserve query string
//!
//! ### Fetch Semantics
//! - Non-2xx responses are returned, not treated as errors
//! - Only transport failures (connect, DNS, timeout, oversized body) are errors
//! - Max redirects: 5, max body bytes: 5MB (both configurable)
//!
//! The controller talks to the network through the `Fetcher` trait so tests
//! can swap in a fake.

pub mod url;

use bytes::Bytes;
use reqwest::{Client, Method, header};
use std::time::{Duration, Instant};

pub use self::url::{UrlError, canonicalize, is_cacheable_scheme, resolve, same_origin};

use ::url::Url;
use fintrack_core::{AppConfig, Error, Snapshot};

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "fintrack-offline/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "fintrack-offline/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// Transport-level fetch failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timeout: {0}")]
    Timeout(String),

    #[error("response too large: {size} bytes exceeds {limit}")]
    TooLarge { size: usize, limit: usize },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { FetchError::Timeout(err.to_string()) } else { FetchError::Network(err.to_string()) }
    }
}

/// A request handed to a `Fetcher`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    /// Ask intermediaries to revalidate instead of answering from their caches.
    pub bypass_cache: bool,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        Self { url, method: Method::GET, headers: Vec::new(), bypass_cache: false }
    }

    pub fn bypass_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }
}

/// Network access used by the cache controller.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `request` and capture the full response under `request.url`.
    async fn fetch(&self, request: &FetchRequest) -> Result<Snapshot, FetchError>;
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(http, config))
    }

    /// Wrap an already configured reqwest client.
    ///
    /// `config.max_bytes` is still enforced; the other fields are informational.
    pub fn with_client(http: Client, config: FetchConfig) -> Self {
        Self { http, config }
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn check_size(&self, size: usize) -> Result<(), FetchError> {
        if size > self.config.max_bytes {
            return Err(FetchError::TooLarge { size, limit: self.config.max_bytes });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Snapshot, FetchError> {
        let start = Instant::now();

        let mut builder = self.http.request(request.method.clone(), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.bypass_cache {
            builder = builder
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }

        let response = builder.send().await?;
        let status = response.status();

        if let Some(len) = response.content_length() {
            self.check_size(len as usize)?;
        }

        let final_url = response.url().clone();
        // Non-UTF-8 bytes in a header value become U+FFFD; the header itself is kept.
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();

        let bytes: Bytes = response.bytes().await?;
        self.check_size(bytes.len())?;

        tracing::debug!(
            "fetched {} -> {} {} in {}ms ({} bytes)",
            request.url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(Snapshot::new(request.url.as_str(), status.as_u16(), headers, bytes.to_vec()))
    }
}
