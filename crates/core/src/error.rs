//! Unified error types for freshtag.
//!
//! Only `NotFound` and `MalformedEntity` ever reach a reader. Tag store
//! failures are absorbed by [`crate::cache::TagStore`] and never surface here
//! past the backend boundary.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the freshtag core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The entity does not exist in the backing store.
    #[error("NOT_FOUND: {entity_type} {entity_id} does not exist")]
    NotFound { entity_type: &'static str, entity_id: i64 },

    /// The entity was fetched but has no usable freshness instant.
    #[error("MALFORMED_ENTITY: {entity_type} {entity_id}: {reason}")]
    MalformedEntity { entity_type: &'static str, entity_id: i64, reason: String },

    /// A tag-generation mode with no implementation was requested.
    #[error("UNKNOWN_STRATEGY: {0}")]
    UnknownStrategy(String),

    /// Tag store backend failure. Absorbed by the tag store wrapper.
    #[error("CACHE_UNAVAILABLE: {0}")]
    CacheUnavailable(String),

    /// Invalid input parameters (e.g., empty name).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A write violated a uniqueness constraint.
    #[error("CONFLICT: {0}")]
    Conflict(String),

    /// Database operation failed.
    #[error("DB_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("DB_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// Whether this error means the entity is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, msg) = &err
            && code.code == rusqlite::ErrorCode::ConstraintViolation
        {
            return Error::Conflict(msg.clone().unwrap_or_else(|| "constraint violation".to_string()));
        }
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => -32602,
            Error::NotFound { .. } => -32001,
            Error::MalformedEntity { .. } => -32003,
            Error::UnknownStrategy(_) => -32004,
            Error::Conflict(_) => -32005,
            Error::CacheUnavailable(_) => -32006,
            Error::Database(_) | Error::MigrationFailed(_) => -32002,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
