//! SQLite tag backend.
//!
//! Entries live in the `tag_entries` table with an absolute expiry in epoch
//! milliseconds. Expired rows are invisible to reads and removed by
//! `purge_expired`. The file runs in WAL mode so several server processes can
//! point at the same path and see each other's tags.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

use super::TagBackend;
use crate::Error;
use crate::db::{Database, Schema};

/// Tag backend over a [`Database`].
#[derive(Clone, Debug)]
pub struct SqliteBackend {
    db: Database,
}

impl SqliteBackend {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        Ok(Self { db: Database::open(path, Schema::Tags).await? })
    }

    pub async fn open_in_memory() -> Result<Self, Error> {
        Ok(Self { db: Database::open_in_memory(Schema::Tags).await? })
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// `LIKE` pattern matching keys that start with `prefix`.
fn prefix_pattern(prefix: &str) -> String {
    let escaped = prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("{escaped}%")
}

#[async_trait]
impl TagBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        let now = now_ms();
        self.db
            .conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let tag = conn
                    .query_row(
                        "SELECT tag FROM tag_entries WHERE key = ?1 AND expires_at > ?2",
                        params![key, now],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(tag)
            })
            .await
            .map_err(Error::from)
    }

    async fn set(&self, key: &str, tag: &str, ttl: Duration) -> Result<(), Error> {
        let key = key.to_string();
        let tag = tag.to_string();
        let expires_at = now_ms().saturating_add(ttl.as_millis().min(i64::MAX as u128) as i64);
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO tag_entries (key, tag, expires_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        tag = excluded.tag,
                        expires_at = excluded.expires_at",
                    params![key, tag, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        let now = now_ms();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let live: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM tag_entries WHERE key = ?1 AND expires_at > ?2)",
                    params![key, now],
                    |row| row.get(0),
                )?;
                conn.execute("DELETE FROM tag_entries WHERE key = ?1", params![key])?;
                Ok(live)
            })
            .await
            .map_err(Error::from)
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<u64, Error> {
        let pattern = prefix_pattern(prefix);
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM tag_entries WHERE key LIKE ?1 ESCAPE '\\'", params![pattern])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn purge_expired(&self) -> Result<u64, Error> {
        let now = now_ms();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM tag_entries WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn count(&self, prefix: &str) -> Result<u64, Error> {
        let pattern = prefix_pattern(prefix);
        let now = now_ms();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM tag_entries WHERE key LIKE ?1 ESCAPE '\\' AND expires_at > ?2",
                    params![pattern, now],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn ping(&self) -> Result<(), Error> {
        self.db.ping().await
    }

    async fn close(&self) {
        self.db.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{TagStore, TagStoreOptions};
    use crate::tag::ValidationTag;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_roundtrip_and_overwrite() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        backend.set("etag:user:1", "\"a\"", Duration::from_secs(60)).await.unwrap();
        backend.set("etag:user:1", "\"b\"", Duration::from_secs(60)).await.unwrap();
        assert_eq!(backend.get("etag:user:1").await.unwrap().as_deref(), Some("\"b\""));
    }

    #[tokio::test]
    async fn test_expired_is_invisible() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        backend.set("etag:user:1", "\"a\"", Duration::ZERO).await.unwrap();
        assert!(backend.get("etag:user:1").await.unwrap().is_none());
        assert!(!backend.delete("etag:user:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_idempotent() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        backend.set("etag:user:1", "\"a\"", Duration::from_secs(60)).await.unwrap();
        assert!(backend.delete("etag:user:1").await.unwrap());
        assert!(!backend.delete("etag:user:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        backend.set("etag:user:1", "\"a\"", Duration::ZERO).await.unwrap();
        backend.set("etag:user:2", "\"b\"", Duration::from_secs(60)).await.unwrap();

        assert_eq!(backend.purge_expired().await.unwrap(), 1);
        assert_eq!(backend.count("etag:").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_prefix_treats_wildcards_literally() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        backend.set("et_g:user:1", "\"a\"", Duration::from_secs(60)).await.unwrap();
        backend.set("etag:user:1", "\"b\"", Duration::from_secs(60)).await.unwrap();

        assert_eq!(backend.clear_prefix("et_g:").await.unwrap(), 1);
        assert!(backend.get("etag:user:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_shared_file_between_stores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tags.sqlite");

        let writer = TagStore::new(Arc::new(SqliteBackend::open(&path).await.unwrap()), TagStoreOptions::default());
        let reader = TagStore::new(Arc::new(SqliteBackend::open(&path).await.unwrap()), TagStoreOptions::default());

        let tag = ValidationTag::strong("user-5-100");
        assert!(writer.set("user", 5, &tag).await);
        assert_eq!(reader.get("user", 5).await, Some(tag));

        assert!(reader.delete("user", 5).await);
        assert!(writer.get("user", 5).await.is_none());
    }

    #[tokio::test]
    async fn test_closed_backend_degrades() {
        let backend = Arc::new(SqliteBackend::open_in_memory().await.unwrap());
        let store = TagStore::new(backend.clone(), TagStoreOptions::default());
        backend.close().await;

        assert!(store.get("user", 1).await.is_none());
        assert!(!store.set("user", 1, &ValidationTag::strong("x")).await);
        assert!(!store.health().await);
    }
}
