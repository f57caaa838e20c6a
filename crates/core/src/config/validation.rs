//! Configuration validation rules.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

/// Longest accepted tag lifetime: one year.
pub const MAX_TAG_TTL_SECS: u64 = 365 * 24 * 60 * 60;

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `tag_ttl_secs` is 0 or exceeds [`MAX_TAG_TTL_SECS`]
    /// - `tag_store_timeout_ms` is outside 100ms..=30s
    /// - `key_namespace` is empty or contains `:`
    /// - `metrics_history` exceeds 100000
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tag_ttl_secs == 0 {
            return Err(invalid("tag_ttl_secs", "must be greater than 0"));
        }
        if self.tag_ttl_secs > MAX_TAG_TTL_SECS {
            return Err(invalid("tag_ttl_secs", format!("must not exceed {MAX_TAG_TTL_SECS} (one year)")));
        }

        if self.tag_store_timeout_ms < 100 {
            return Err(invalid("tag_store_timeout_ms", "must be at least 100ms"));
        }
        if self.tag_store_timeout_ms > 30_000 {
            return Err(invalid("tag_store_timeout_ms", "must not exceed 30 seconds (30000ms)"));
        }

        if self.key_namespace.is_empty() {
            return Err(invalid("key_namespace", "must not be empty"));
        }
        if self.key_namespace.contains(':') {
            return Err(invalid("key_namespace", "must not contain ':'"));
        }

        if self.metrics_history > 100_000 {
            return Err(invalid("metrics_history", "must not exceed 100000"));
        }

        if self.db_path == self.tag_db_path {
            tracing::warn!(
                path = %self.db_path.display(),
                "db_path and tag_db_path point at the same file; tags and entities share one database"
            );
        }

        Ok(())
    }
}
