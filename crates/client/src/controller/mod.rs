//! Offline cache controller.
//!
//! Sits between the application shell and the network and decides, per
//! request, whether to answer from the cache generation or from the network.
//!
//! ### Lifecycle
//! - Install pre-caches a fixed manifest, best effort per item
//! - Skip-waiting: an installed controller activates right away
//! - Claim: activation takes control of open clients without a reload
//!
//! ### Policies
//! - Navigations are network-first with a cached document fallback
//! - Other GETs are cache-first; successful same-origin responses are
//!   stored as they pass through
//! - Non-GET and non-http(s) requests are passed through untouched

mod install;
mod intercept;
mod lifecycle;

#[cfg(test)]
mod testing;

pub use install::{InstallReport, PrecacheError, PrecacheItem};
pub use intercept::{Request, RequestMode};
pub use lifecycle::WorkerState;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fintrack_core::{AppConfig, CacheStore, Error, Snapshot};
use serde::Serialize;
use url::Url;

use crate::fetch::{Fetcher, resolve};
use lifecycle::Lifecycle;

/// Immutable controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Name of the cache generation entries are read from and written to.
    pub generation: String,
    /// URL the controller is registered at. Its origin is the controller's origin.
    pub scope: Url,
    /// Locators pre-cached during install, relative ones resolve against `scope`.
    pub manifest: Vec<String>,
    /// Keys tried when a navigation cannot reach the network.
    pub navigation_fallbacks: Vec<String>,
    /// Keys tried when any other GET cannot reach the network.
    pub offline_fallbacks: Vec<String>,
    /// Document captured at install and stored under `scope`.
    pub fallback_document: Option<String>,
    /// Activate as soon as install finishes instead of waiting to be asked.
    pub skip_waiting: bool,
    /// Take control of already open clients on activation.
    pub claim_clients: bool,
    /// Discard every other generation during activation.
    pub purge_stale_on_activate: bool,
}

impl ControllerConfig {
    /// Configuration with the default manifest and fallbacks.
    pub fn new(generation: impl Into<String>, scope: Url) -> Self {
        let defaults = AppConfig::default();
        Self {
            generation: generation.into(),
            scope,
            manifest: defaults.manifest,
            navigation_fallbacks: defaults.navigation_fallbacks,
            offline_fallbacks: defaults.offline_fallbacks,
            fallback_document: Some(defaults.fallback_document),
            skip_waiting: true,
            claim_clients: true,
            purge_stale_on_activate: defaults.purge_stale_on_activate,
        }
    }
}

impl TryFrom<&AppConfig> for ControllerConfig {
    type Error = Error;

    fn try_from(config: &AppConfig) -> Result<Self, Self::Error> {
        let scope = Url::parse(&config.scope).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.scope)))?;
        Ok(Self {
            generation: config.generation.clone(),
            scope,
            manifest: config.manifest.clone(),
            navigation_fallbacks: config.navigation_fallbacks.clone(),
            offline_fallbacks: config.offline_fallbacks.clone(),
            fallback_document: Some(config.fallback_document.clone()).filter(|d| !d.is_empty()),
            skip_waiting: true,
            claim_clients: true,
            purge_stale_on_activate: config.purge_stale_on_activate,
        })
    }
}

/// Where a response handed back to the client came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Exact match in the cache generation.
    Cache,
    /// Live network response.
    Network,
    /// A fallback entry served because the network was unreachable.
    Fallback,
}

/// Outcome of intercepting one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Not intercepted; the host performs its default handling.
    PassThrough,
    Respond { response: Snapshot, source: Source },
    /// Neither the network nor a cached fallback could produce a response.
    NetworkError,
}

impl Disposition {
    pub fn response(&self) -> Option<&Snapshot> {
        match self {
            Disposition::Respond { response, .. } => Some(response),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<Source> {
        match self {
            Disposition::Respond { source, .. } => Some(*source),
            _ => None,
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self, Disposition::PassThrough)
    }
}

/// Cache controller for one worker instance.
///
/// Shared behind an `Arc`; request handling needs only `&self`.
pub struct CacheController {
    config: ControllerConfig,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn CacheStore>,
    lifecycle: Mutex<Lifecycle>,
    navigation_fallbacks: Vec<Url>,
    offline_fallbacks: Vec<Url>,
}

impl CacheController {
    pub fn new(config: ControllerConfig, fetcher: Arc<dyn Fetcher>, store: Arc<dyn CacheStore>) -> Self {
        let navigation_fallbacks = resolve_keys(&config.scope, &config.navigation_fallbacks);
        let offline_fallbacks = resolve_keys(&config.scope, &config.offline_fallbacks);
        Self {
            config,
            fetcher,
            store,
            lifecycle: Mutex::new(Lifecycle::new()),
            navigation_fallbacks,
            offline_fallbacks,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn generation(&self) -> &str {
        &self.config.generation
    }

    pub fn state(&self) -> WorkerState {
        self.lifecycle().state()
    }

    /// Whether open clients are controlled without waiting for a reload.
    pub fn controls_clients(&self) -> bool {
        self.lifecycle().controls_clients()
    }

    /// Never held across an await.
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install, then activate right away when skip-waiting is set.
    pub async fn start(&self) -> Result<InstallReport, Error> {
        let report = self.install().await?;
        if self.config.skip_waiting {
            self.activate().await?;
        }
        Ok(report)
    }

    /// Pick up a generation installed by an earlier worker instance.
    ///
    /// If an install of the current generation ran to completion, the
    /// controller becomes active without fetching anything and `true` is
    /// returned. A generation left behind by an abandoned install does not
    /// count. Otherwise nothing changes and the caller should `start` instead.
    pub async fn resume(&self) -> Result<bool, Error> {
        if !self.store.is_installed(&self.config.generation).await? {
            return Ok(false);
        }
        self.lifecycle().restore_activated(self.config.claim_clients)?;
        Ok(true)
    }

    /// Activate an installed controller.
    ///
    /// Returns the generations discarded on the way, which is empty unless
    /// `purge_stale_on_activate` is set.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.lifecycle().begin_activate()?;

        let discarded = if self.config.purge_stale_on_activate {
            match self.discard_stale_generations().await {
                Ok(discarded) => discarded,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to discard stale generations");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        self.lifecycle().finish_activate(self.config.claim_clients)?;
        Ok(discarded)
    }

    /// Delete every generation other than the current one.
    pub async fn discard_stale_generations(&self) -> Result<Vec<String>, Error> {
        let mut discarded = Vec::new();
        for name in self.store.generations().await? {
            if name != self.config.generation && self.store.delete(&name).await? {
                tracing::info!(generation = %name, "discarded stale cache generation");
                discarded.push(name);
            }
        }
        Ok(discarded)
    }

    /// Keys stored in the current generation.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        self.store.keys(&self.config.generation).await
    }

    /// Cache lookup where a storage failure counts as a miss.
    async fn lookup(&self, key: &str) -> Option<Snapshot> {
        match self.store.match_key(&self.config.generation, key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache lookup failed");
                None
            }
        }
    }

    async fn first_match(&self, keys: &[Url]) -> Option<Snapshot> {
        for key in keys {
            if let Some(hit) = self.lookup(key.as_str()).await {
                return Some(hit);
            }
        }
        None
    }

    /// Store a copy of `response` under `key`; failures are logged and dropped.
    async fn store_copy(&self, key: &Url, response: &Snapshot) {
        let copy = response.with_url(key.as_str());
        if let Err(e) = self.store.put(&self.config.generation, &copy).await {
            tracing::warn!(key = %key, error = %e, "cache write failed");
        }
    }
}

fn resolve_keys(scope: &Url, locators: &[String]) -> Vec<Url> {
    locators
        .iter()
        .filter_map(|locator| match resolve(scope, locator) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(locator = %locator, error = %e, "ignoring fallback key");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeFetcher, controller_with};
    use super::*;
    use fintrack_core::MemoryStore;

    #[test]
    fn test_config_from_app_config() {
        let app = AppConfig { fallback_document: String::new(), ..Default::default() };
        let config = ControllerConfig::try_from(&app).unwrap();

        assert_eq!(config.generation, "finance-offline-v1");
        assert_eq!(config.scope.as_str(), "http://localhost:8080/");
        assert_eq!(config.fallback_document, None);
        assert!(config.skip_waiting);
        assert!(config.claim_clients);
    }

    #[test]
    fn test_fallback_keys_resolve_against_scope() {
        let scope = Url::parse("https://budget.example.com/app/").unwrap();
        let keys = resolve_keys(&scope, &["./index.html".into(), "/".into(), "data:,x".into()]);
        let keys: Vec<&str> = keys.iter().map(Url::as_str).collect();
        assert_eq!(keys, vec!["https://budget.example.com/app/index.html", "https://budget.example.com/"]);
    }

    #[tokio::test]
    async fn test_start_installs_and_activates() {
        let (controller, _fetcher, _store) = controller_with(FakeFetcher::new());

        controller.start().await.unwrap();

        assert_eq!(controller.state(), WorkerState::Activated);
        assert!(controller.controls_clients());
    }

    #[tokio::test]
    async fn test_without_skip_waiting_stays_installed() {
        let fetcher = Arc::new(FakeFetcher::new());
        let store = Arc::new(MemoryStore::new());
        let mut config = ControllerConfig::new("v1", Url::parse("http://localhost:8080/").unwrap());
        config.skip_waiting = false;
        let controller = CacheController::new(config, fetcher, store);

        controller.start().await.unwrap();
        assert_eq!(controller.state(), WorkerState::Installed);

        controller.activate().await.unwrap();
        assert_eq!(controller.state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_activate_before_install_fails() {
        let (controller, _fetcher, _store) = controller_with(FakeFetcher::new());
        assert!(matches!(controller.activate().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_resume_existing_generation() {
        let fetcher = Arc::new(FakeFetcher::new());
        let store = Arc::new(MemoryStore::new());
        store.mark_installed("finance-offline-v1").await.unwrap();
        let config = ControllerConfig::new("finance-offline-v1", Url::parse("http://localhost:8080/").unwrap());
        let controller = CacheController::new(config, fetcher.clone(), store);

        assert!(controller.resume().await.unwrap());
        assert_eq!(controller.state(), WorkerState::Activated);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_resume_ignores_unfinished_generation() {
        let fetcher = Arc::new(FakeFetcher::new());
        let store = Arc::new(MemoryStore::new());
        store
            .put("finance-offline-v1", &Snapshot::new("http://localhost:8080/", 200, Vec::new(), b"partial".to_vec()))
            .await
            .unwrap();
        let config = ControllerConfig::new("finance-offline-v1", Url::parse("http://localhost:8080/").unwrap());
        let controller = CacheController::new(config, fetcher, store);

        assert!(!controller.resume().await.unwrap());
        assert_eq!(controller.state(), WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_resume_without_generation_needs_install() {
        let (controller, _fetcher, _store) = controller_with(FakeFetcher::new());

        assert!(!controller.resume().await.unwrap());
        assert_eq!(controller.state(), WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_old_generation_persists_by_default() {
        let fetcher = Arc::new(FakeFetcher::new());
        let store = Arc::new(MemoryStore::new());
        store
            .put("finance-offline-v0", &Snapshot::new("http://localhost:8080/", 200, Vec::new(), b"old".to_vec()))
            .await
            .unwrap();

        let config = ControllerConfig::new("finance-offline-v1", Url::parse("http://localhost:8080/").unwrap());
        let controller = CacheController::new(config, fetcher, store.clone());
        controller.start().await.unwrap();

        assert!(store.has("finance-offline-v0").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_stale_on_activate() {
        let fetcher = Arc::new(FakeFetcher::new());
        let store = Arc::new(MemoryStore::new());
        store.open("finance-offline-v0").await.unwrap();

        let mut config = ControllerConfig::new("finance-offline-v1", Url::parse("http://localhost:8080/").unwrap());
        config.purge_stale_on_activate = true;
        let controller = CacheController::new(config, fetcher, store.clone());
        controller.install().await.unwrap();

        let discarded = controller.activate().await.unwrap();

        assert_eq!(discarded, vec!["finance-offline-v0".to_string()]);
        assert_eq!(store.generations().await.unwrap(), vec!["finance-offline-v1".to_string()]);
    }
}
