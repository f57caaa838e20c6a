//! Tag maintenance after writes.
//!
//! Every successful write to an entity must be followed by [`invalidate`]
//! (or [`refresh`], which overwrites the entry) before the write is
//! acknowledged. Until then other readers may still be told their stale copy
//! is current.
//!
//! [`invalidate`]: ValidationEngine::invalidate
//! [`refresh`]: ValidationEngine::refresh

use super::ValidationEngine;
use crate::Error;
use crate::entity::Entity;
use crate::tag::ValidationTag;

impl ValidationEngine {
    /// Drop the cached tag for one entity.
    ///
    /// Succeeds whether or not a tag was cached. A tag store failure is only
    /// logged; the entry then lives until its TTL.
    pub async fn invalidate(&self, entity_type: &str, entity_id: i64) {
        let removed = self.tags.delete(entity_type, entity_id).await;
        tracing::debug!(entity_type, entity_id, removed, "tag invalidated");
    }

    /// Write-through: compute the tag for `entity` and cache it.
    ///
    /// The tag is returned even when caching it failed, so the caller can
    /// still send it to the client.
    pub async fn refresh<E: Entity>(&self, entity: &E) -> Result<ValidationTag, Error> {
        let tag = self.tag_for(entity)?;
        let cached = self.tags.set(E::ENTITY_TYPE, entity.id(), &tag).await;
        tracing::debug!(entity_type = E::ENTITY_TYPE, entity_id = entity.id(), %tag, cached, "tag refreshed");
        Ok(tag)
    }
}
