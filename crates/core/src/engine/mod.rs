//! Validation engine.
//!
//! Decides whether a client's copy of an entity is still current using the
//! tag store first and the entity store only on a miss:
//!
//! 1. Look up the cached tag.
//! 2. Hit: compare against the client tag. The entity store is not touched.
//! 3. Miss: fetch the entity (absent -> `NotFound`, nothing cached), derive
//!    its tag, write the tag back best-effort, and hand the fetched entity to
//!    the caller so it never has to read it a second time.
//!
//! No lock spans lookup and write-back. An invalidation landing in between
//! can leave a stale tag cached until its TTL or the next invalidation.

mod invalidation;

#[cfg(test)]
pub(crate) mod fixtures;

use std::sync::Arc;

use serde::Serialize;

use crate::Error;
use crate::cache::TagStore;
use crate::entity::{Entity, EntityStore};
use crate::metrics::{EngineEvent, MetricsRecorder};
use crate::tag::{IfNoneMatch, TagGenerator, ValidationTag};

/// Terminal decision of a validation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// The client copy is current; send no body.
    NotModified,
    /// A full response is required.
    Modified,
}

/// What the caller has to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Respond without a body.
    NotModified,
    /// Respond with the entity already attached to the outcome.
    Modified,
    /// Respond with the entity, which the caller must fetch itself.
    ModifiedStaleTag,
}

/// Result of one validation call.
///
/// `entity` is `Some` exactly when the entity store was read during the call,
/// which is also exactly when `served_from_cache` is false.
#[derive(Debug, Clone)]
pub struct ValidationOutcome<E> {
    pub decision: Decision,
    pub current_tag: ValidationTag,
    pub served_from_cache: bool,
    pub entity: Option<E>,
}

impl<E> ValidationOutcome<E> {
    pub fn is_not_modified(&self) -> bool {
        self.decision == Decision::NotModified
    }

    pub fn disposition(&self) -> Disposition {
        match (self.decision, self.entity.is_some()) {
            (Decision::NotModified, _) => Disposition::NotModified,
            (Decision::Modified, true) => Disposition::Modified,
            (Decision::Modified, false) => Disposition::ModifiedStaleTag,
        }
    }
}

/// Coordinates the tag store, tag generator, and entity store.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    tags: TagStore,
    generator: TagGenerator,
    metrics: Arc<MetricsRecorder>,
}

/// Current tag plus the entity, when it had to be fetched.
struct Lookup<E> {
    tag: ValidationTag,
    entity: Option<E>,
}

impl ValidationEngine {
    pub fn new(tags: TagStore, generator: TagGenerator, metrics: Arc<MetricsRecorder>) -> Self {
        Self { tags, generator, metrics }
    }

    pub fn tags(&self) -> &TagStore {
        &self.tags
    }

    pub fn generator(&self) -> TagGenerator {
        self.generator
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    /// Tag for `entity` under the configured strategy. No I/O.
    pub fn tag_for<E: Entity>(&self, entity: &E) -> Result<ValidationTag, Error> {
        self.generator.generate_for(entity)
    }

    /// Validate a client tag by exact string comparison.
    ///
    /// `client_tag == None` always yields `Modified`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the tag is not cached and the entity does not exist,
    /// `MalformedEntity` if the fetched entity has no usable freshness.
    pub async fn validate<S: EntityStore>(
        &self, store: &S, entity_id: i64, client_tag: Option<&str>,
    ) -> Result<ValidationOutcome<S::Entity>, Error> {
        let lookup = self.lookup(store, entity_id).await?;
        let decision = match client_tag {
            Some(client) if lookup.tag == *client => Decision::NotModified,
            _ => Decision::Modified,
        };
        Ok(self.finish(<S::Entity as Entity>::ENTITY_TYPE, entity_id, decision, lookup))
    }

    /// Validate a parsed `If-None-Match` condition.
    ///
    /// Same lookup path as [`Self::validate`]; matching uses weak
    /// comparison since the tags come from outside.
    pub async fn validate_conditional<S: EntityStore>(
        &self, store: &S, entity_id: i64, condition: &IfNoneMatch,
    ) -> Result<ValidationOutcome<S::Entity>, Error> {
        let lookup = self.lookup(store, entity_id).await?;
        let decision = if condition.matches(&lookup.tag) { Decision::NotModified } else { Decision::Modified };
        Ok(self.finish(<S::Entity as Entity>::ENTITY_TYPE, entity_id, decision, lookup))
    }

    async fn lookup<S: EntityStore>(&self, store: &S, entity_id: i64) -> Result<Lookup<S::Entity>, Error> {
        let entity_type = <S::Entity as Entity>::ENTITY_TYPE;

        if let Some(tag) = self.tags.get(entity_type, entity_id).await {
            self.metrics.observe(EngineEvent::TagHit);
            return Ok(Lookup { tag, entity: None });
        }
        self.metrics.observe(EngineEvent::TagMiss);

        self.metrics.observe(EngineEvent::EntityFetch);
        let entity = store
            .fetch(entity_id)
            .await?
            .ok_or(Error::NotFound { entity_type, entity_id })?;

        let tag = self.generator.generate_for(&entity)?;
        self.tags.set(entity_type, entity_id, &tag).await;

        Ok(Lookup { tag, entity: Some(entity) })
    }

    fn finish<E>(&self, entity_type: &str, entity_id: i64, decision: Decision, lookup: Lookup<E>) -> ValidationOutcome<E> {
        let served_from_cache = lookup.entity.is_none();
        if served_from_cache && decision == Decision::NotModified {
            self.metrics.observe(EngineEvent::FetchAvoided);
        }

        tracing::debug!(
            entity_type,
            entity_id,
            tag = %lookup.tag,
            served_from_cache,
            ?decision,
            "validated"
        );

        ValidationOutcome { decision, current_tag: lookup.tag, served_from_cache, entity: lookup.entity }
    }
}
