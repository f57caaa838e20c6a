//! Process-local tag backend.
//!
//! Entries expire lazily on read; `purge_expired` sweeps the rest.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::TagBackend;
use crate::Error;

struct CachedTag {
    tag: String,
    expires_at: Instant,
}

impl CachedTag {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory tag backend.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, CachedTag>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TagBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(cached) if !cached.is_expired() => return Ok(Some(cached.tag.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(CachedTag::is_expired) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, tag: &str, ttl: Duration) -> Result<(), Error> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| Error::CacheUnavailable(format!("ttl of {}s overflows the clock", ttl.as_secs())))?;
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), CachedTag { tag: tag.to_string(), expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, Error> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(key).is_some_and(|cached| !cached.is_expired()))
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<u64, Error> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn purge_expired(&self) -> Result<u64, Error> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, cached| !cached.is_expired());
        Ok((before - entries.len()) as u64)
    }

    async fn count(&self, prefix: &str) -> Result<u64, Error> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(key, cached)| key.starts_with(prefix) && !cached.is_expired())
            .count() as u64)
    }

    async fn ping(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip() {
        let backend = MemoryBackend::new();
        backend.set("etag:user:1", "\"a\"", Duration::from_secs(60)).await.unwrap();
        assert_eq!(backend.get("etag:user:1").await.unwrap().as_deref(), Some("\"a\""));
    }

    #[tokio::test]
    async fn test_overwrite_resets_entry() {
        let backend = MemoryBackend::new();
        backend.set("etag:user:1", "\"a\"", Duration::ZERO).await.unwrap();
        backend.set("etag:user:1", "\"b\"", Duration::from_secs(60)).await.unwrap();
        assert_eq!(backend.get("etag:user:1").await.unwrap().as_deref(), Some("\"b\""));
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss() {
        let backend = MemoryBackend::new();
        backend.set("etag:user:1", "\"a\"", Duration::ZERO).await.unwrap();
        assert!(backend.get("etag:user:1").await.unwrap().is_none());
        assert!(backend.entries.read().await.is_empty());
        assert!(!backend.delete("etag:user:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let backend = MemoryBackend::new();
        backend.set("etag:user:1", "\"a\"", Duration::ZERO).await.unwrap();
        backend.set("etag:user:2", "\"b\"", Duration::from_secs(60)).await.unwrap();

        assert_eq!(backend.purge_expired().await.unwrap(), 1);
        assert_eq!(backend.count("etag:").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_rejected() {
        let backend = MemoryBackend::new();
        let result = backend.set("etag:user:1", "\"a\"", Duration::MAX).await;
        assert!(matches!(result, Err(Error::CacheUnavailable(_))));
        assert!(backend.get("etag:user:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_absorbs_unrepresentable_ttl() {
        use crate::cache::TagStore;
        use crate::tag::ValidationTag;

        let store = TagStore::in_memory();
        assert!(!store.set_with_ttl("user", 1, &ValidationTag::strong("a"), Duration::MAX).await);
        assert!(store.get("user", 1).await.is_none());
        assert!(store.set("user", 1, &ValidationTag::strong("a")).await);
    }
}
