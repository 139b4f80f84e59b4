//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (FINTRACK_*)
//! 2. TOML config file (if FINTRACK_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Cache generation shipped with the current application shell.
pub const DEFAULT_GENERATION: &str = "finance-offline-v1";

/// Static assets of the application shell plus the third-party scripts it loads.
pub const DEFAULT_MANIFEST: &[&str] = &[
    "./",
    "./index.html",
    "./manifest.json",
    "./style.css",
    "./script.js",
    "./manifest-icon.png",
    "https://unpkg.com/dexie@3.2.2/dist/dexie.min.js",
    "https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.min.js",
];

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (FINTRACK_*)
/// 2. TOML config file (if FINTRACK_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via FINTRACK_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Name of the current cache generation.
    ///
    /// Changing it starts a fresh, empty partition. Set via FINTRACK_GENERATION.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Absolute URL the controller is registered at.
    ///
    /// Relative locators resolve against it, and its origin decides which
    /// responses are populated at runtime. Set via FINTRACK_SCOPE.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Ordered list of locators fetched during install.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Keys tried, in order, when a navigation request cannot reach the network.
    #[serde(default = "default_navigation_fallbacks")]
    pub navigation_fallbacks: Vec<String>,

    /// Keys tried, in order, when any other GET cannot reach the network.
    #[serde(default = "default_offline_fallbacks")]
    pub offline_fallbacks: Vec<String>,

    /// Document captured at install and stored under the scope URL.
    ///
    /// Set to an empty string to skip the capture.
    #[serde(default = "default_fallback_document")]
    pub fallback_document: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via FINTRACK_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via FINTRACK_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via FINTRACK_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Maximum number of redirects followed per fetch.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Whether activation discards every generation but the current one.
    ///
    /// Set via FINTRACK_PURGE_STALE_ON_ACTIVATE environment variable.
    #[serde(default)]
    pub purge_stale_on_activate: bool,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./fintrack-offline.sqlite")
}

fn default_generation() -> String {
    DEFAULT_GENERATION.into()
}

fn default_scope() -> String {
    "http://localhost:8080/".into()
}

fn default_manifest() -> Vec<String> {
    DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect()
}

fn default_navigation_fallbacks() -> Vec<String> {
    vec!["./index.html".into(), "/".into()]
}

fn default_offline_fallbacks() -> Vec<String> {
    vec!["./".into(), "/".into()]
}

fn default_fallback_document() -> String {
    "./index.html".into()
}

fn default_user_agent() -> String {
    "fintrack-offline/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_max_redirects() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            generation: default_generation(),
            scope: default_scope(),
            manifest: default_manifest(),
            navigation_fallbacks: default_navigation_fallbacks(),
            offline_fallbacks: default_offline_fallbacks(),
            fallback_document: default_fallback_document(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            max_redirects: default_max_redirects(),
            purge_stale_on_activate: false,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `FINTRACK_`
    /// 2. TOML file from `FINTRACK_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("FINTRACK_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(figment.merge(Self::env()))
    }

    fn env() -> Env {
        Env::prefixed("FINTRACK_")
            .ignore(&["CONFIG_FILE"])
            .map(|key| key.as_str().to_lowercase().into())
            .split("__")
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
