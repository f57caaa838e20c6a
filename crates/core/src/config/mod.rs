//! Application configuration with layered loading.
//!
//! Sources, highest precedence first:
//!
//! 1. Environment variables (FRESHTAG_*)
//! 2. TOML config file (if FRESHTAG_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::metrics::DEFAULT_HISTORY;
use crate::tag::TagStrategy;

mod validation;

pub use validation::{ConfigError, MAX_TAG_TTL_SECS};

/// Which backend holds validation tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagStoreKind {
    /// SQLite file at `tag_db_path`, shareable between processes.
    #[default]
    Sqlite,
    /// Process-local map.
    Memory,
    /// No caching; every read goes to the entity store.
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding entities.
    ///
    /// Set via FRESHTAG_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Tag store backend.
    ///
    /// Set via FRESHTAG_TAG_STORE environment variable.
    #[serde(default)]
    pub tag_store: TagStoreKind,

    /// Path to the SQLite file used when `tag_store = "sqlite"`.
    ///
    /// Point several servers at the same file to share tags between them.
    #[serde(default = "default_tag_db_path")]
    pub tag_db_path: PathBuf,

    /// Lifetime of a cached tag in seconds.
    #[serde(default = "default_tag_ttl_secs")]
    pub tag_ttl_secs: u64,

    /// Upper bound on a single tag store call in milliseconds.
    #[serde(default = "default_tag_store_timeout_ms")]
    pub tag_store_timeout_ms: u64,

    /// Prefix for every tag store key.
    #[serde(default = "default_key_namespace")]
    pub key_namespace: String,

    /// Tag derivation: `timestamp`, `version`, or `hash`.
    ///
    /// Set via FRESHTAG_TAG_STRATEGY environment variable. Matching is
    /// case-insensitive.
    #[serde(default, deserialize_with = "deserialize_strategy")]
    pub tag_strategy: TagStrategy,

    /// Number of recent requests kept by the metrics recorder.
    #[serde(default = "default_metrics_history")]
    pub metrics_history: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./freshtag.sqlite")
}

fn default_tag_db_path() -> PathBuf {
    PathBuf::from("./freshtag-tags.sqlite")
}

fn default_tag_ttl_secs() -> u64 {
    86_400 // 24h
}

fn default_tag_store_timeout_ms() -> u64 {
    5_000
}

fn default_key_namespace() -> String {
    "etag".into()
}

fn deserialize_strategy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TagStrategy, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

fn default_metrics_history() -> usize {
    DEFAULT_HISTORY
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            tag_store: TagStoreKind::default(),
            tag_db_path: default_tag_db_path(),
            tag_ttl_secs: default_tag_ttl_secs(),
            tag_store_timeout_ms: default_tag_store_timeout_ms(),
            key_namespace: default_key_namespace(),
            tag_strategy: TagStrategy::default(),
            metrics_history: default_metrics_history(),
        }
    }
}

impl AppConfig {
    pub fn tag_ttl(&self) -> Duration {
        Duration::from_secs(self.tag_ttl_secs)
    }

    pub fn tag_store_timeout(&self) -> Duration {
        Duration::from_millis(self.tag_store_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("FRESHTAG_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("FRESHTAG_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into()),
        );

        Self::from_figment(&figment)
    }

    /// Extract and validate from an assembled figment.
    ///
    /// An unknown `tag_strategy` surfaces as `ConfigError::Invalid` on that
    /// field; other extraction failures are `ConfigError::LoadFailed`.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| {
            if e.path.iter().any(|key| key == "tag_strategy") {
                ConfigError::Invalid { field: "tag_strategy".into(), reason: e.kind.to_string() }
            } else {
                ConfigError::LoadFailed(e.to_string())
            }
        })?;
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
        assert_eq!(config.db_path, PathBuf::from("./freshtag.sqlite"));
        assert_eq!(config.tag_store, TagStoreKind::Sqlite);
        assert_eq!(config.tag_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.tag_store_timeout(), Duration::from_secs(5));
        assert_eq!(config.key_namespace, "etag");
        assert_eq!(config.tag_strategy, TagStrategy::Timestamp);
        assert_eq!(config.metrics_history, 1000);
    }

    fn layered(toml: &str) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::string(toml))
    }

    #[test]
    fn test_file_overrides_defaults() {
        let config = AppConfig::from_figment(&layered(
            "tag_store = \"memory\"\ntag_ttl_secs = 60\ntag_strategy = \"version\"",
        ))
        .unwrap();
        assert_eq!(config.tag_store, TagStoreKind::Memory);
        assert_eq!(config.tag_ttl_secs, 60);
        assert_eq!(config.tag_strategy, TagStrategy::Version);
        assert_eq!(config.key_namespace, "etag");
    }

    #[test]
    fn test_from_figment_rejects_unknown_strategy() {
        let result = AppConfig::from_figment(&layered("tag_strategy = \"random\""));
        match result {
            Err(ConfigError::Invalid { field, reason }) => {
                assert_eq!(field, "tag_strategy");
                assert!(reason.contains("UNKNOWN_STRATEGY"), "{reason}");
                assert!(reason.contains("\"random\""), "{reason}");
            }
            other => panic!("expected invalid tag_strategy, got {other:?}"),
        }
    }

    #[test]
    fn test_strategy_is_case_insensitive() {
        let config = AppConfig::from_figment(&layered("tag_strategy = \" Hash \"")).unwrap();
        assert_eq!(config.tag_strategy, TagStrategy::Hash);
    }

    #[test]
    fn test_default_strategy_survives_layering() {
        let config = AppConfig::from_figment(&layered("tag_ttl_secs = 30")).unwrap();
        assert_eq!(config.tag_strategy, TagStrategy::Timestamp);
    }

    #[test]
    fn test_from_figment_rejects_unknown_backend() {
        let result = AppConfig::from_figment(&layered("tag_store = \"redis\""));
        assert!(matches!(result, Err(ConfigError::LoadFailed(_))));
    }
}
