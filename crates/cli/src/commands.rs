//! Subcommand implementations.
//!
//! Each command returns a serializable summary; `main` prints it as JSON on
//! stdout while logs go to stderr.

use std::sync::Arc;

use anyhow::{Context, Result};
use fintrack_client::{
    CacheController, ControllerConfig, Disposition, FetchConfig, Fetcher, HttpFetcher, InstallReport, Method,
    PrecacheItem, Request, RequestMode, Source, WorkerState,
};
use fintrack_core::{AppConfig, CacheDb, CacheStore, MemoryStore};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),
}

/// Store selected by the config, or a throwaway in-memory one.
pub async fn open_store(config: &AppConfig, in_memory: bool) -> Result<Arc<dyn CacheStore>> {
    if in_memory {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache database {}", config.db_path.display()))?;
    Ok(Arc::new(db))
}

pub fn http_fetcher(config: &AppConfig) -> Result<Arc<dyn Fetcher>> {
    Ok(Arc::new(HttpFetcher::new(FetchConfig::from(config))?))
}

pub fn controller(config: &AppConfig, fetcher: Arc<dyn Fetcher>, store: Arc<dyn CacheStore>) -> Result<CacheController> {
    let controller_config = ControllerConfig::try_from(config)?;
    Ok(CacheController::new(controller_config, fetcher, store))
}

#[derive(Debug, Serialize)]
pub struct ItemSummary {
    pub locator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&PrecacheItem> for ItemSummary {
    fn from(item: &PrecacheItem) -> Self {
        match &item.result {
            Ok(key) => Self { locator: item.locator.clone(), key: Some(key.clone()), error: None },
            Err(e) => Self { locator: item.locator.clone(), key: None, error: Some(e.to_string()) },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InstallSummary {
    pub generation: String,
    pub state: WorkerState,
    pub cached: usize,
    pub skipped: usize,
    pub items: Vec<ItemSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ItemSummary>,
}

impl InstallSummary {
    fn new(report: &InstallReport, state: WorkerState) -> Self {
        Self {
            generation: report.generation.clone(),
            state,
            cached: report.cached(),
            skipped: report.skipped(),
            items: report.items.iter().map(ItemSummary::from).collect(),
            fallback: report.fallback.as_ref().map(ItemSummary::from),
        }
    }
}

pub async fn install(controller: &CacheController) -> Result<InstallSummary> {
    let report = controller.start().await?;
    Ok(InstallSummary::new(&report, controller.state()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Respond,
    PassThrough,
    NetworkError,
}

#[derive(Debug, Serialize)]
pub struct FetchSummary {
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
}

impl From<&Disposition> for FetchSummary {
    fn from(disposition: &Disposition) -> Self {
        let outcome = match disposition {
            Disposition::Respond { .. } => Outcome::Respond,
            Disposition::PassThrough => Outcome::PassThrough,
            Disposition::NetworkError => Outcome::NetworkError,
        };
        let response = disposition.response();
        Self {
            outcome,
            source: disposition.source(),
            url: response.map(|r| r.url.clone()),
            status: response.map(|r| r.status),
            content_type: response.and_then(|r| r.content_type()).map(str::to_string),
            bytes: response.map(|r| r.body.len()),
        }
    }
}

pub fn build_request(url: &str, method: &str, navigate: bool) -> Result<Request, CommandError> {
    let method =
        Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| CommandError::InvalidMethod(method.into()))?;
    let mut request = Request::new(method, url);
    if navigate {
        request.mode = RequestMode::Navigate;
    }
    Ok(request)
}

/// Bring the controller to `Activated`, reusing a persisted generation when there is one.
pub async fn ensure_active(controller: &CacheController) -> Result<()> {
    if controller.resume().await? {
        tracing::debug!(generation = controller.generation(), "resumed existing generation");
        return Ok(());
    }
    let report = controller.start().await?;
    tracing::info!(cached = report.cached(), skipped = report.skipped(), "installed before first fetch");
    Ok(())
}

pub async fn fetch(controller: &CacheController, request: &Request) -> Result<Disposition> {
    ensure_active(controller).await?;
    Ok(controller.handle_fetch(request).await)
}

#[derive(Debug, Serialize)]
pub struct KeysSummary {
    pub generation: String,
    pub keys: Vec<String>,
}

pub async fn keys(controller: &CacheController) -> Result<KeysSummary> {
    Ok(KeysSummary { generation: controller.generation().to_string(), keys: controller.keys().await? })
}

#[derive(Debug, Serialize)]
pub struct GenerationsSummary {
    pub current: String,
    pub generations: Vec<String>,
}

pub async fn generations(config: &AppConfig, store: &dyn CacheStore) -> Result<GenerationsSummary> {
    Ok(GenerationsSummary { current: config.generation.clone(), generations: store.generations().await? })
}

#[derive(Debug, Serialize)]
pub struct PurgeSummary {
    pub discarded: Vec<String>,
}

/// Delete `generation`, or every generation except the current one.
pub async fn purge(
    controller: &CacheController, store: &dyn CacheStore, generation: Option<&str>,
) -> Result<PurgeSummary> {
    let discarded = match generation {
        Some(name) => {
            if store.delete(name).await? {
                vec![name.to_string()]
            } else {
                Vec::new()
            }
        }
        None => controller.discard_stale_generations().await?,
    };
    Ok(PurgeSummary { discarded })
}
