//! Tag generation strategies.
//!
//! The strategy is fixed when the [`TagGenerator`] is built from
//! configuration; nothing re-reads it per request.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ValidationTag;
use crate::Error;
use crate::entity::Entity;

/// How a tag is derived from an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagStrategy {
    /// `"<type>-<id>-<unix seconds>"` from the last-modified instant.
    #[default]
    Timestamp,
    /// `"<type>-<id>-v<version>"` from the entity's version counter.
    Version,
    /// Hex SHA-256 of the entity's JSON serialization.
    Hash,
}

impl TagStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Version => "version",
            Self::Hash => "hash",
        }
    }
}

impl FromStr for TagStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "timestamp" => Ok(Self::Timestamp),
            "version" => Ok(Self::Version),
            "hash" => Ok(Self::Hash),
            other => Err(Error::UnknownStrategy(format!(
                "{other:?} (expected one of: timestamp, version, hash)"
            ))),
        }
    }
}

/// Timestamp tag for an entity.
///
/// Sub-second precision is dropped, so two updates within the same second
/// produce the same tag.
pub fn generate(entity_type: &str, entity_id: i64, freshness: DateTime<Utc>) -> ValidationTag {
    ValidationTag::strong(format!("{entity_type}-{entity_id}-{}", freshness.timestamp()))
}

/// Version-counter tag for an entity.
pub fn generate_version(entity_type: &str, entity_id: i64, version: i64) -> ValidationTag {
    ValidationTag::strong(format!("{entity_type}-{entity_id}-v{version}"))
}

/// Content-digest tag.
pub fn generate_digest(content: &[u8]) -> ValidationTag {
    ValidationTag::strong(hex::encode(Sha256::digest(content)))
}

/// Produces tags for entities using one configured strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagGenerator {
    strategy: TagStrategy,
}

impl TagGenerator {
    pub fn new(strategy: TagStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> TagStrategy {
        self.strategy
    }

    /// Compute the current tag for `entity`.
    ///
    /// Only the hash strategy can fail, when the entity cannot be serialized.
    pub fn generate_for<E: Entity>(&self, entity: &E) -> Result<ValidationTag, Error> {
        match self.strategy {
            TagStrategy::Timestamp => Ok(generate(E::ENTITY_TYPE, entity.id(), entity.modified_at())),
            TagStrategy::Version => Ok(generate_version(E::ENTITY_TYPE, entity.id(), entity.version())),
            TagStrategy::Hash => {
                let bytes = serde_json::to_vec(entity).map_err(|e| Error::MalformedEntity {
                    entity_type: E::ENTITY_TYPE,
                    entity_id: entity.id(),
                    reason: format!("cannot serialize for hashing: {e}"),
                })?;
                Ok(generate_digest(&bytes))
            }
        }
    }
}
