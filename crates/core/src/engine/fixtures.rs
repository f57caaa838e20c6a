//! Test doubles for the validation engine.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use super::ValidationEngine;
use crate::Error;
use crate::cache::TagStore;
use crate::entity::{Entity, EntityStore, User};
use crate::metrics::MetricsRecorder;
use crate::tag::TagGenerator;

enum Slot {
    Present(User),
    Malformed,
}

/// In-memory user store that counts every fetch.
#[derive(Default)]
pub(crate) struct CountingStore {
    users: Mutex<HashMap<i64, Slot>>,
    fetches: AtomicUsize,
}

impl CountingStore {
    pub(crate) fn with(user: User) -> Self {
        let store = Self::default();
        store.put(user);
        store
    }

    pub(crate) fn put(&self, user: User) {
        self.users.lock().insert(user.id, Slot::Present(user));
    }

    /// Make `id` decode as a record without a usable freshness instant.
    pub(crate) fn put_malformed(&self, id: i64) {
        self.users.lock().insert(id, Slot::Malformed);
    }

    pub(crate) fn remove(&self, id: i64) {
        self.users.lock().remove(&id);
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityStore for CountingStore {
    type Entity = User;

    async fn fetch(&self, entity_id: i64) -> Result<Option<User>, Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.users.lock().get(&entity_id) {
            None => Ok(None),
            Some(Slot::Present(user)) => Ok(Some(user.clone())),
            Some(Slot::Malformed) => Err(Error::MalformedEntity {
                entity_type: User::ENTITY_TYPE,
                entity_id,
                reason: "updated_at is missing".into(),
            }),
        }
    }
}

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 10, 13, 12, 0, 0).unwrap()
}

pub(crate) fn user(id: i64, updated_at: DateTime<Utc>) -> User {
    User {
        id,
        name: format!("User {id}"),
        email: format!("user{id}@example.com"),
        created_at: t0(),
        updated_at,
        version: 1,
    }
}

pub(crate) fn engine_with(tags: TagStore) -> ValidationEngine {
    ValidationEngine::new(tags, TagGenerator::default(), Arc::new(MetricsRecorder::default()))
}
