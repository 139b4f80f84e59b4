//! Install: bulk pre-cache of the manifest.
//!
//! Every manifest item is attempted in order and gets its own result. A
//! failing item never aborts the batch and never fails the install.
//!
//! The generation is marked installed in the store only after the last
//! item; an install dropped halfway leaves it unmarked and the controller
//! back in `Parsed`, so the next attempt starts over.

use fintrack_core::Error;

use super::CacheController;
use crate::fetch::{FetchError, FetchRequest, UrlError, resolve};

/// Why a single manifest item was not cached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrecacheError {
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unsuccessful status: {0}")]
    Status(u16),

    #[error("cache write failed: {0}")]
    Store(String),
}

impl From<UrlError> for PrecacheError {
    fn from(err: UrlError) -> Self {
        match err {
            UrlError::UnsupportedScheme(scheme) => PrecacheError::UnsupportedScheme(scheme),
            other => PrecacheError::InvalidLocator(other.to_string()),
        }
    }
}

/// Result for one manifest locator: the cache key it was stored under, or why not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheItem {
    pub locator: String,
    pub result: Result<String, PrecacheError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub generation: String,
    pub items: Vec<PrecacheItem>,
    /// Capture of the fallback document, `None` when none is configured.
    pub fallback: Option<PrecacheItem>,
}

impl InstallReport {
    /// Manifest items now in the cache.
    pub fn cached(&self) -> usize {
        self.items.iter().filter(|item| item.result.is_ok()).count()
    }

    /// Manifest items that were skipped or failed.
    pub fn skipped(&self) -> usize {
        self.items.len() - self.cached()
    }

    pub fn is_complete(&self) -> bool {
        self.skipped() == 0
    }
}

impl CacheController {
    /// Pre-cache the manifest and capture the fallback document.
    ///
    /// Only fails if the controller was already installed; per-item failures
    /// are reported in the returned `InstallReport`.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.lifecycle().begin_install()?;
        let guard = InstallGuard { controller: self, finished: false };

        let generation = self.config.generation.clone();
        if let Err(e) = self.store.open(&generation).await {
            tracing::warn!(generation = %generation, error = %e, "failed to open cache generation");
        }

        let mut items = Vec::with_capacity(self.config.manifest.len());
        for locator in &self.config.manifest {
            let result = self.precache(locator, None).await;
            match &result {
                Ok(key) => tracing::debug!(key = %key, "pre-cached"),
                Err(e) => tracing::debug!(locator = %locator, error = %e, "skipped manifest item"),
            }
            items.push(PrecacheItem { locator: locator.clone(), result });
        }

        let fallback = match &self.config.fallback_document {
            Some(document) => {
                let scope_key = self.config.scope.to_string();
                let result = self.precache(document, Some(scope_key)).await;
                Some(PrecacheItem { locator: document.clone(), result })
            }
            None => None,
        };

        if let Err(e) = self.store.mark_installed(&generation).await {
            tracing::warn!(generation = %generation, error = %e, "failed to record finished install");
        }
        guard.finish()?;

        let report = InstallReport { generation, items, fallback };
        tracing::info!(
            generation = %report.generation,
            cached = report.cached(),
            skipped = report.skipped(),
            "install complete"
        );
        Ok(report)
    }

    /// Fetch one locator bypassing intermediary caches and store it.
    ///
    /// Stored under its resolved URL unless `store_as` names another key.
    async fn precache(&self, locator: &str, store_as: Option<String>) -> Result<String, PrecacheError> {
        let url = resolve(&self.config.scope, locator)?;

        let response = self.fetcher.fetch(&FetchRequest::get(url.clone()).bypass_cache()).await?;
        if !response.is_cacheable() {
            return Err(PrecacheError::Status(response.status));
        }

        let key = store_as.unwrap_or_else(|| url.to_string());
        self.store
            .put(&self.config.generation, &response.with_url(key.as_str()))
            .await
            .map_err(|e| PrecacheError::Store(e.to_string()))?;
        Ok(key)
    }
}

/// Reverts the lifecycle to `Parsed` unless the install it guards finishes.
struct InstallGuard<'a> {
    controller: &'a CacheController,
    finished: bool,
}

impl InstallGuard<'_> {
    fn finish(mut self) -> Result<(), Error> {
        self.finished = true;
        self.controller.lifecycle().finish_install()
    }
}

impl Drop for InstallGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.controller.lifecycle().abort_install();
        }
    }
}
