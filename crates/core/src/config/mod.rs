//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (EDGECACHE_*)
//! 2. TOML config file (if EDGECACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Which HTTP front the binary runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Edge proxy: `/api/` goes to the backend, the rest to the asset directory.
    #[default]
    Edge,
    /// Local gateway: every request goes through the cache worker.
    Gateway,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (EDGECACHE_*)
/// 2. TOML config file (if EDGECACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which server to run.
    ///
    /// Set via EDGECACHE_MODE (`edge` or `gateway`).
    #[serde(default)]
    pub mode: Mode,

    /// Socket address the server binds to.
    ///
    /// Set via EDGECACHE_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Backend origin that `/api/` requests are rewritten to.
    ///
    /// Set via EDGECACHE_BACKEND_URL environment variable.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Single origin allowed by the CORS headers.
    ///
    /// Set via EDGECACHE_ALLOWED_ORIGIN environment variable.
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,

    /// Directory static assets are served from.
    ///
    /// Set via EDGECACHE_ASSETS_DIR environment variable.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,

    /// Upstream origin the gateway resolves requests against.
    ///
    /// Set via EDGECACHE_ORIGIN_URL environment variable.
    #[serde(default = "default_origin_url")]
    pub origin_url: String,

    /// Path to the SQLite cache store database.
    ///
    /// Set via EDGECACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Prefix shared by every cache store name.
    ///
    /// Set via EDGECACHE_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Current cache version. Stores from other versions are purged on activation.
    ///
    /// Set via EDGECACHE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: u32,

    /// Resources written to the precache store at install time.
    ///
    /// Set via EDGECACHE_PRECACHE_URLS environment variable (array syntax: `["/", "/index.html"]`).
    #[serde(default = "default_precache_urls")]
    pub precache_urls: Vec<String>,

    /// Cap on runtime store entries. Oldest entries are evicted past it.
    ///
    /// Set via EDGECACHE_RUNTIME_MAX_ENTRIES environment variable.
    #[serde(default)]
    pub runtime_max_entries: Option<usize>,

    /// User-Agent string for outbound requests.
    ///
    /// Set via EDGECACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum request or response body size in bytes.
    ///
    /// Set via EDGECACHE_MAX_BODY_BYTES environment variable.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Outbound request timeout in milliseconds. Unset means no timeout.
    ///
    /// Set via EDGECACHE_TIMEOUT_MS environment variable.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Title used for push notifications.
    ///
    /// Set via EDGECACHE_NOTIFICATION_TITLE environment variable.
    #[serde(default = "default_notification_title")]
    pub notification_title: String,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8787))
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8080".into()
}

fn default_allowed_origin() -> String {
    "http://localhost:8787".into()
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("./public")
}

fn default_origin_url() -> String {
    "http://127.0.0.1:3000".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./edgecache.sqlite")
}

fn default_cache_prefix() -> String {
    "edgecache".into()
}

fn default_cache_version() -> u32 {
    1
}

fn default_precache_urls() -> Vec<String> {
    vec!["/".into(), "/index.html".into()]
}

fn default_user_agent() -> String {
    "edgecache/0.1".into()
}

fn default_max_body_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_notification_title() -> String {
    "edgecache".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            listen_addr: default_listen_addr(),
            backend_url: default_backend_url(),
            allowed_origin: default_allowed_origin(),
            assets_dir: default_assets_dir(),
            origin_url: default_origin_url(),
            db_path: default_db_path(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            precache_urls: default_precache_urls(),
            runtime_max_entries: None,
            user_agent: default_user_agent(),
            max_body_bytes: default_max_body_bytes(),
            timeout_ms: None,
            notification_title: default_notification_title(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `EDGECACHE_`
    /// 2. TOML file from `EDGECACHE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("EDGECACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("EDGECACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.mode, Mode::Edge);
        assert_eq!(config.listen_addr, "127.0.0.1:8787".parse().unwrap());
        assert_eq!(config.db_path, PathBuf::from("./edgecache.sqlite"));
        assert_eq!(config.cache_prefix, "edgecache");
        assert_eq!(config.cache_version, 1);
        assert_eq!(config.precache_urls, vec!["/".to_string(), "/index.html".to_string()]);
        assert_eq!(config.max_body_bytes, 5_242_880);
        assert!(config.runtime_max_entries.is_none());
        assert!(config.timeout_ms.is_none());
    }

    #[test]
    fn test_no_timeout_by_default() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), None);

        let config = AppConfig { timeout_ms: Some(1500), ..Default::default() };
        assert_eq!(config.timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_load_from_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("EDGECACHE_MODE", "gateway");
            jail.set_env("EDGECACHE_CACHE_VERSION", "3");
            jail.set_env("EDGECACHE_BACKEND_URL", "https://api.example.com");

            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.mode, Mode::Gateway);
            assert_eq!(config.cache_version, 3);
            assert_eq!(config.backend_url, "https://api.example.com");
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "edgecache.toml",
                r#"
                    cache_prefix = "dict"
                    precache_urls = ["/", "/offline.html"]
                    runtime_max_entries = 50
                "#,
            )?;
            jail.set_env("EDGECACHE_CONFIG_FILE", "edgecache.toml");
            jail.set_env("EDGECACHE_CACHE_PREFIX", "override");

            let config = AppConfig::load().expect("config loads");
            assert_eq!(config.cache_prefix, "override");
            assert_eq!(config.precache_urls, vec!["/".to_string(), "/offline.html".to_string()]);
            assert_eq!(config.runtime_max_entries, Some(50));
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("EDGECACHE_BACKEND_URL", "ftp://backend");
            let result = AppConfig::load();
            assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "backend_url"));
            Ok(())
        });
    }
}
