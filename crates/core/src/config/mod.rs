//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELTER_*)
//! 2. TOML config file (if SHELTER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELTER_*)
/// 2. TOML config file (if SHELTER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the current cache generation. Bump it to deploy a new version.
    ///
    /// Set via SHELTER_CACHE_NAME environment variable.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Base URL that manifest entries and relative request URLs resolve against.
    ///
    /// Set via SHELTER_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Resource identifiers pre-populated at install, in order.
    ///
    /// Set via SHELTER_MANIFEST environment variable (array syntax, e.g. `[a, b]`).
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Manifest entry served for failed navigations.
    ///
    /// Set via SHELTER_OFFLINE_DOCUMENT environment variable.
    #[serde(default = "default_offline_document")]
    pub offline_document: String,

    /// Network deadline for cacheable requests, in milliseconds.
    ///
    /// Set via SHELTER_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Network deadline for bypassed requests, in milliseconds.
    ///
    /// Set via SHELTER_BYPASS_TIMEOUT_MS environment variable.
    #[serde(default = "default_bypass_timeout_ms")]
    pub bypass_timeout_ms: u64,

    /// Network deadline for each manifest fetch during install, in milliseconds.
    ///
    /// Set via SHELTER_INSTALL_TIMEOUT_MS environment variable.
    #[serde(default = "default_install_timeout_ms")]
    pub install_timeout_ms: u64,

    /// Host substrings whose requests always go straight to the network.
    ///
    /// Set via SHELTER_BYPASS_HOSTS environment variable (array syntax, e.g. `[a, b]`).
    #[serde(default = "default_bypass_hosts")]
    pub bypass_hosts: Vec<String>,

    /// Whether non-GET requests take the bypass path.
    ///
    /// Set via SHELTER_BYPASS_NON_GET environment variable.
    #[serde(default = "default_true")]
    pub bypass_non_get: bool,

    /// Whether successful network responses are stored for later cache hits.
    ///
    /// Set via SHELTER_DYNAMIC_CACHING environment variable.
    #[serde(default = "default_true")]
    pub dynamic_caching: bool,

    /// Whether activation deletes every generation but the current one.
    ///
    /// Set via SHELTER_EVICT_STALE_GENERATIONS environment variable.
    #[serde(default = "default_true")]
    pub evict_stale_generations: bool,

    /// Whether a successful install activates immediately.
    ///
    /// Set via SHELTER_SKIP_WAITING environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Message carried in the JSON error body of failed bypassed requests.
    ///
    /// Set via SHELTER_OFFLINE_MESSAGE environment variable.
    #[serde(default = "default_offline_message")]
    pub offline_message: String,

    /// Plain-text body of the 503 response for failed non-navigation requests.
    ///
    /// Set via SHELTER_UNAVAILABLE_MESSAGE environment variable.
    #[serde(default = "default_unavailable_message")]
    pub unavailable_message: String,

    /// Path to the SQLite cache database.
    ///
    /// Set via SHELTER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    ///
    /// Set via SHELTER_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body size in bytes.
    ///
    /// Set via SHELTER_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_cache_name() -> String {
    "shelter-v1".into()
}

fn default_origin() -> String {
    "http://localhost:8080/".into()
}

fn default_manifest() -> Vec<String> {
    ["./", "index.html", "manifest.json", "logo.png", "offline.html"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_offline_document() -> String {
    "offline.html".into()
}

fn default_timeout_ms() -> u64 {
    3_000
}

fn default_bypass_timeout_ms() -> u64 {
    5_000
}

fn default_install_timeout_ms() -> u64 {
    30_000
}

fn default_bypass_hosts() -> Vec<String> {
    vec!["script.google.com".into()]
}

fn default_true() -> bool {
    true
}

fn default_offline_message() -> String {
    "You are offline.".into()
}

fn default_unavailable_message() -> String {
    "Offline or resource not found.".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shelter-cache.sqlite")
}

fn default_user_agent() -> String {
    "shelter/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            origin: default_origin(),
            manifest: default_manifest(),
            offline_document: default_offline_document(),
            timeout_ms: default_timeout_ms(),
            bypass_timeout_ms: default_bypass_timeout_ms(),
            install_timeout_ms: default_install_timeout_ms(),
            bypass_hosts: default_bypass_hosts(),
            bypass_non_get: true,
            dynamic_caching: true,
            evict_stale_generations: true,
            skip_waiting: true,
            offline_message: default_offline_message(),
            unavailable_message: default_unavailable_message(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn bypass_timeout(&self) -> Duration {
        Duration::from_millis(self.bypass_timeout_ms)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_millis(self.install_timeout_ms)
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELTER_`
    /// 2. TOML file from `SHELTER_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("SHELTER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELTER_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(figment)
    }

    /// Extract and validate configuration from a prepared figment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::LoadFailed` on extraction errors and
    /// `ConfigError::Invalid` when validation fails.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
