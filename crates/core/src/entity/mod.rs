//! Entities and the stores that hold them.
//!
//! The validation engine only needs [`EntityStore::fetch`] and the freshness
//! accessors on [`Entity`]. A freshness instant is required on every entity;
//! stores reject records without one while decoding them.

pub mod users;

pub use users::{User, UserPatch, UserStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Error;

/// A record whose freshness can be turned into a validation tag.
pub trait Entity: Serialize + Send + Sync {
    /// Type name used in tag store keys and tags (`user`, `product`, ...).
    const ENTITY_TYPE: &'static str;

    fn id(&self) -> i64;

    /// Last-modified instant. Non-decreasing across updates.
    fn modified_at(&self) -> DateTime<Utc>;

    /// Monotonic version counter, bumped on every update.
    fn version(&self) -> i64;
}

/// Source of record for one entity type.
#[async_trait]
pub trait EntityStore: Send + Sync {
    type Entity: Entity;

    /// Fetch an entity by id. `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// `MalformedEntity` when the stored record has no usable freshness
    /// instant, or a storage error.
    async fn fetch(&self, entity_id: i64) -> Result<Option<Self::Entity>, Error>;
}
