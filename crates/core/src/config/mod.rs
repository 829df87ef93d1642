//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (ITINERA_*)
//! 2. TOML config file (if ITINERA_CONFIG_FILE set)
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

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (ITINERA_*)
/// 2. TOML config file (if ITINERA_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the current store generation.
    ///
    /// Deploying a new name makes every other generation stale.
    /// Set via ITINERA_CACHE_NAME environment variable.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Origin the travel page is served from; relative precache paths
    /// resolve against it.
    ///
    /// Set via ITINERA_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path to SQLite cache database.
    ///
    /// Set via ITINERA_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via ITINERA_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via ITINERA_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via ITINERA_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Assets fetched and stored on install.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Host substrings that mark a request as a dynamic API call.
    #[serde(default = "default_api_hosts")]
    pub api_hosts: Vec<String>,

    /// Per-category freshness windows.
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// TTL overrides for the freshness policy table, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_weather_ttl_ms")]
    pub weather_ttl_ms: u64,
    #[serde(default = "default_events_ttl_ms")]
    pub events_ttl_ms: u64,
    #[serde(default = "default_traffic_ttl_ms")]
    pub traffic_ttl_ms: u64,
    #[serde(default = "default_default_ttl_ms")]
    pub default_ttl_ms: u64,
}

fn default_cache_name() -> String {
    "travel-planner-v1".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./itinera-cache.sqlite")
}

fn default_user_agent() -> String {
    "itinera/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

fn default_precache() -> Vec<String> {
    vec![
        "/".into(),
        "/index.html".into(),
        "/manifest.json".into(),
        "https://fonts.googleapis.com/css2?family=Inter:wght@400;600&display=swap".into(),
    ]
}

fn default_api_hosts() -> Vec<String> {
    vec!["openweathermap.org".into(), "ticketmaster.com".into(), "api.tomtom.com".into()]
}

fn default_weather_ttl_ms() -> u64 {
    10 * 60 * 1000
}

fn default_events_ttl_ms() -> u64 {
    60 * 60 * 1000
}

fn default_traffic_ttl_ms() -> u64 {
    2 * 60 * 1000
}

fn default_default_ttl_ms() -> u64 {
    5 * 60 * 1000
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            weather_ttl_ms: default_weather_ttl_ms(),
            events_ttl_ms: default_events_ttl_ms(),
            traffic_ttl_ms: default_traffic_ttl_ms(),
            default_ttl_ms: default_default_ttl_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            origin: default_origin(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
            precache: default_precache(),
            api_hosts: default_api_hosts(),
            policy: PolicyConfig::default(),
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
    /// 1. Environment variables prefixed with `ITINERA_`
    /// 2. TOML file from `ITINERA_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("ITINERA_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("ITINERA_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
