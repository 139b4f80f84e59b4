//! Fetch interception.
//!
//! Navigations go network-first and fall back to a cached document.
//! Everything else goes cache-first and is populated opportunistically
//! when the response is successful and same-origin.
//!
//! A reachable resource whose body exceeds the fetch size limit is handed
//! back to the host untouched; fallbacks are only for an unreachable network.

use reqwest::Method;
use url::Url;

use super::{CacheController, Disposition, Source, WorkerState};
use crate::fetch::{FetchError, FetchRequest, canonicalize, same_origin};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestMode {
    /// Top-level document load.
    Navigate,
    /// Assets, scripts, API calls and anything else.
    #[default]
    Subresource,
}

/// A request issued by the application shell.
///
/// `url` is kept as given; it may be malformed or use a scheme the
/// controller does not handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), mode: RequestMode::Subresource, headers: Vec::new() }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self { mode: RequestMode::Navigate, ..Self::get(url) }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn to_fetch(&self, url: Url) -> FetchRequest {
        FetchRequest { url, method: self.method.clone(), headers: self.headers.clone(), bypass_cache: false }
    }
}

impl CacheController {
    /// Decide how to answer one request.
    ///
    /// Never fails: every network or storage problem ends in a fallback, a
    /// pass-through, or `Disposition::NetworkError` for this request alone.
    pub async fn handle_fetch(&self, request: &Request) -> Disposition {
        if self.state() != WorkerState::Activated {
            return Disposition::PassThrough;
        }

        if request.method != Method::GET {
            tracing::trace!(method = %request.method, url = %request.url, "not intercepted");
            return Disposition::PassThrough;
        }

        let url = match canonicalize(&request.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::trace!(url = %request.url, error = %e, "not cacheable");
                return Disposition::PassThrough;
            }
        };

        match request.mode {
            RequestMode::Navigate => self.network_first(request, url).await,
            RequestMode::Subresource => self.cache_first(request, url).await,
        }
    }

    async fn network_first(&self, request: &Request, url: Url) -> Disposition {
        match self.fetcher.fetch(&request.to_fetch(url.clone())).await {
            Ok(response) if response.is_success() => {
                if response.is_cacheable() {
                    self.store_copy(&url, &response).await;
                }
                Disposition::Respond { response, source: Source::Network }
            }
            Ok(response) => {
                // Unsuccessful navigation: prefer an exact cached copy, else hand back
                // what the network said.
                match self.lookup(url.as_str()).await {
                    Some(cached) => Disposition::Respond { response: cached, source: Source::Cache },
                    None => Disposition::Respond { response, source: Source::Network },
                }
            }
            Err(FetchError::TooLarge { size, limit }) => too_large(&url, size, limit),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "navigation offline, trying fallbacks");
                match self.first_match(&self.navigation_fallbacks).await {
                    Some(document) => Disposition::Respond { response: document, source: Source::Fallback },
                    None => Disposition::NetworkError,
                }
            }
        }
    }

    async fn cache_first(&self, request: &Request, url: Url) -> Disposition {
        if let Some(cached) = self.lookup(url.as_str()).await {
            tracing::trace!(url = %url, "cache hit");
            return Disposition::Respond { response: cached, source: Source::Cache };
        }

        match self.fetcher.fetch(&request.to_fetch(url.clone())).await {
            Ok(response) => {
                if response.is_cacheable() && same_origin(&url, &self.config.scope) {
                    self.store_copy(&url, &response).await;
                }
                Disposition::Respond { response, source: Source::Network }
            }
            Err(FetchError::TooLarge { size, limit }) => too_large(&url, size, limit),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "fetch failed, trying offline fallbacks");
                match self.first_match(&self.offline_fallbacks).await {
                    Some(fallback) => Disposition::Respond { response: fallback, source: Source::Fallback },
                    None => Disposition::NetworkError,
                }
            }
        }
    }
}

fn too_large(url: &Url, size: usize, limit: usize) -> Disposition {
    tracing::debug!(url = %url, size, limit, "response over size limit, not intercepted");
    Disposition::PassThrough
}
