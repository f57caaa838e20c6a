//! Expiring tag store.
//!
//! [`TagStore`] maps `(entity_type, entity_id)` to the entity's current
//! validation tag with a fixed TTL. The storage itself is a [`TagBackend`],
//! chosen once at startup:
//!
//! - [`SqliteBackend`]: a WAL-mode SQLite file that several processes can share
//! - [`MemoryBackend`]: process-local map, for single-instance setups and tests
//! - [`DisabledBackend`]: stores nothing; every read is a miss
//!
//! The store is best-effort. Backend errors and timeouts are logged at warn
//! and reported as "not cached" / "not stored"; nothing here ever fails a
//! caller. Correctness never depends on a tag being present.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::config::{AppConfig, TagStoreKind};
use crate::tag::ValidationTag;

/// Raw storage operations behind a [`TagStore`].
///
/// Implementations report failures as errors; the wrapper decides how to
/// degrade. Keys arrive fully namespaced.
#[async_trait]
pub trait TagBackend: Send + Sync {
    /// Short name for logs and stats.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    async fn set(&self, key: &str, tag: &str, ttl: Duration) -> Result<(), Error>;

    /// Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, Error>;

    /// Remove every key starting with `prefix`. Returns the number removed.
    async fn clear_prefix(&self, prefix: &str) -> Result<u64, Error>;

    /// Drop entries whose TTL has passed. Returns the number removed.
    async fn purge_expired(&self) -> Result<u64, Error>;

    /// Number of unexpired entries under `prefix`.
    async fn count(&self, prefix: &str) -> Result<u64, Error>;

    async fn ping(&self) -> Result<(), Error>;

    async fn close(&self) {}
}

/// Backend that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBackend;

#[async_trait]
impl TagBackend for DisabledBackend {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, Error> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _tag: &str, _ttl: Duration) -> Result<(), Error> {
        Err(Error::CacheUnavailable("tag store is disabled".into()))
    }

    async fn delete(&self, _key: &str) -> Result<bool, Error> {
        Ok(false)
    }

    async fn clear_prefix(&self, _prefix: &str) -> Result<u64, Error> {
        Ok(0)
    }

    async fn purge_expired(&self) -> Result<u64, Error> {
        Ok(0)
    }

    async fn count(&self, _prefix: &str) -> Result<u64, Error> {
        Ok(0)
    }

    async fn ping(&self) -> Result<(), Error> {
        Err(Error::CacheUnavailable("tag store is disabled".into()))
    }
}

/// Tag store settings.
#[derive(Debug, Clone)]
pub struct TagStoreOptions {
    /// Prefix for every key, keeping tags apart from other users of a shared store.
    pub namespace: String,
    /// Lifetime applied to every entry.
    pub ttl: Duration,
    /// Upper bound on any single backend call.
    pub timeout: Duration,
}

impl Default for TagStoreOptions {
    fn default() -> Self {
        Self { namespace: "etag".into(), ttl: Duration::from_secs(24 * 60 * 60), timeout: Duration::from_secs(5) }
    }
}

/// Tag store diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TagStoreStats {
    pub backend: String,
    pub connected: bool,
    pub entries: u64,
    pub ttl_secs: u64,
}

/// Best-effort, namespaced, expiring tag store.
#[derive(Clone)]
pub struct TagStore {
    backend: Arc<dyn TagBackend>,
    options: Arc<TagStoreOptions>,
}

impl std::fmt::Debug for TagStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagStore")
            .field("backend", &self.backend.name())
            .field("options", &self.options)
            .finish()
    }
}

impl TagStore {
    pub fn new(backend: Arc<dyn TagBackend>, options: TagStoreOptions) -> Self {
        Self { backend, options: Arc::new(options) }
    }

    /// A store that caches nothing.
    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledBackend), TagStoreOptions::default())
    }

    /// In-process store with default options.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), TagStoreOptions::default())
    }

    /// Build the backend named in `config`.
    ///
    /// If the SQLite file cannot be opened the store starts disabled; reads
    /// then always go to the entity store.
    pub async fn connect(config: &AppConfig) -> Self {
        let options = TagStoreOptions {
            namespace: config.key_namespace.clone(),
            ttl: config.tag_ttl(),
            timeout: config.tag_store_timeout(),
        };

        let backend: Arc<dyn TagBackend> = match config.tag_store {
            TagStoreKind::Memory => Arc::new(MemoryBackend::new()),
            TagStoreKind::Disabled => Arc::new(DisabledBackend),
            TagStoreKind::Sqlite => match tokio::time::timeout(options.timeout, SqliteBackend::open(&config.tag_db_path)).await {
                Ok(Ok(backend)) => Arc::new(backend),
                Ok(Err(e)) => {
                    tracing::warn!(path = %config.tag_db_path.display(), error = %e, "tag store unavailable, caching disabled");
                    Arc::new(DisabledBackend)
                }
                Err(_) => {
                    tracing::warn!(path = %config.tag_db_path.display(), "tag store open timed out, caching disabled");
                    Arc::new(DisabledBackend)
                }
            },
        };

        tracing::info!(backend = backend.name(), namespace = %options.namespace, ttl_secs = options.ttl.as_secs(), "tag store ready");
        Self::new(backend, options)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn options(&self) -> &TagStoreOptions {
        &self.options
    }

    /// Namespaced key: `<namespace>:<entity_type>:<entity_id>`.
    pub fn key(&self, entity_type: &str, entity_id: i64) -> String {
        format!("{}:{entity_type}:{entity_id}", self.options.namespace)
    }

    fn prefix(&self) -> String {
        format!("{}:", self.options.namespace)
    }

    /// Run a backend call under the configured timeout.
    async fn bounded<T>(&self, op: &'static str, key: &str, fut: impl Future<Output = Result<T, Error>>) -> Option<T> {
        match tokio::time::timeout(self.options.timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(op, key, backend = self.backend.name(), error = %e, "tag store operation failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    op,
                    key,
                    backend = self.backend.name(),
                    timeout_ms = self.options.timeout.as_millis() as u64,
                    "tag store operation timed out"
                );
                None
            }
        }
    }

    /// Look up the cached tag. Failures read as a miss.
    pub async fn get(&self, entity_type: &str, entity_id: i64) -> Option<ValidationTag> {
        let key = self.key(entity_type, entity_id);
        let tag = self.bounded("get", &key, self.backend.get(&key)).await.flatten();
        match &tag {
            Some(tag) => tracing::debug!(%key, %tag, "tag cache hit"),
            None => tracing::debug!(%key, "tag cache miss"),
        }
        tag.map(ValidationTag::new)
    }

    /// Store a tag with the configured TTL.
    pub async fn set(&self, entity_type: &str, entity_id: i64, tag: &ValidationTag) -> bool {
        self.set_with_ttl(entity_type, entity_id, tag, self.options.ttl).await
    }

    /// Store a tag with an explicit TTL. Returns false if it was not stored.
    pub async fn set_with_ttl(&self, entity_type: &str, entity_id: i64, tag: &ValidationTag, ttl: Duration) -> bool {
        let key = self.key(entity_type, entity_id);
        let stored = self
            .bounded("set", &key, self.backend.set(&key, tag.as_str(), ttl))
            .await
            .is_some();
        if stored {
            tracing::debug!(%key, %tag, ttl_secs = ttl.as_secs(), "tag cached");
        }
        stored
    }

    /// Remove a tag. False when nothing was there or the backend failed.
    pub async fn delete(&self, entity_type: &str, entity_id: i64) -> bool {
        let key = self.key(entity_type, entity_id);
        let deleted = self.bounded("delete", &key, self.backend.delete(&key)).await.unwrap_or(false);
        tracing::debug!(%key, deleted, "tag delete");
        deleted
    }

    /// Remove every tag in this store's namespace.
    pub async fn clear_all(&self) -> Option<u64> {
        let prefix = self.prefix();
        let cleared = self.bounded("clear", &prefix, self.backend.clear_prefix(&prefix)).await;
        if let Some(count) = cleared {
            tracing::info!(count, namespace = %self.options.namespace, "cleared tag store");
        }
        cleared
    }

    /// Drop expired entries.
    pub async fn purge_expired(&self) -> Option<u64> {
        self.bounded("purge_expired", "*", self.backend.purge_expired()).await
    }

    /// Liveness probe. Diagnostics only.
    pub async fn health(&self) -> bool {
        self.bounded("ping", "*", self.backend.ping()).await.is_some()
    }

    pub async fn stats(&self) -> TagStoreStats {
        let prefix = self.prefix();
        let connected = self.health().await;
        let entries = if connected {
            self.bounded("count", &prefix, self.backend.count(&prefix)).await.unwrap_or(0)
        } else {
            0
        };
        TagStoreStats {
            backend: self.backend.name().to_string(),
            connected,
            entries,
            ttl_secs: self.options.ttl.as_secs(),
        }
    }

    /// Release backend resources.
    pub async fn disconnect(&self) {
        self.backend.close().await;
        tracing::info!(backend = self.backend.name(), "tag store disconnected");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Backend whose every call fails, standing in for an unreachable cache.
    pub struct FailingBackend;

    #[async_trait]
    impl TagBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }

        async fn set(&self, _key: &str, _tag: &str, _ttl: Duration) -> Result<(), Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> Result<bool, Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }

        async fn clear_prefix(&self, _prefix: &str) -> Result<u64, Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }

        async fn purge_expired(&self) -> Result<u64, Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }

        async fn count(&self, _prefix: &str) -> Result<u64, Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }

        async fn ping(&self) -> Result<(), Error> {
            Err(Error::CacheUnavailable("connection refused".into()))
        }
    }

    /// Backend that never answers.
    pub struct HangingBackend;

    #[async_trait]
    impl TagBackend for HangingBackend {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, Error> {
            std::future::pending().await
        }

        async fn set(&self, _key: &str, _tag: &str, _ttl: Duration) -> Result<(), Error> {
            std::future::pending().await
        }

        async fn delete(&self, _key: &str) -> Result<bool, Error> {
            std::future::pending().await
        }

        async fn clear_prefix(&self, _prefix: &str) -> Result<u64, Error> {
            std::future::pending().await
        }

        async fn purge_expired(&self) -> Result<u64, Error> {
            std::future::pending().await
        }

        async fn count(&self, _prefix: &str) -> Result<u64, Error> {
            std::future::pending().await
        }

        async fn ping(&self) -> Result<(), Error> {
            std::future::pending().await
        }
    }
}
