//! SQLite-backed user store.
//!
//! Every write sets `updated_at` and bumps `version`, which is what the tag
//! strategies feed on. Cache invalidation is not done here; callers pair
//! writes with [`crate::engine::ValidationEngine::invalidate`] and `refresh`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

use super::{Entity, EntityStore};
use crate::Error;
use crate::db::Database;

/// A user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl Entity for User {
    const ENTITY_TYPE: &'static str = "user";

    fn id(&self) -> i64 {
        self.id
    }

    fn modified_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn version(&self) -> i64 {
        self.version
    }
}

/// Partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Row as stored, before the freshness column is checked.
struct UserRow {
    id: i64,
    name: String,
    email: String,
    created_at: String,
    updated_at: Option<String>,
    version: i64,
}

impl UserRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            version: row.get(5)?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = Error;

    fn try_from(row: UserRow) -> Result<Self, Error> {
        let malformed = |reason: String| Error::MalformedEntity { entity_type: User::ENTITY_TYPE, entity_id: row.id, reason };

        let updated_at = row
            .updated_at
            .as_deref()
            .ok_or_else(|| malformed("updated_at is missing".into()))
            .and_then(|raw| parse_timestamp(raw).map_err(|e| malformed(format!("updated_at {raw:?}: {e}"))))?;
        let created_at =
            parse_timestamp(&row.created_at).map_err(|e| malformed(format!("created_at {:?}: {e}", row.created_at)))?;

        Ok(User { id: row.id, name: row.name, email: row.email, created_at, updated_at, version: row.version })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Utc))
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn validate_name(name: &str) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("name cannot be empty".into()));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), Error> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(Error::InvalidInput(format!("invalid email address: {email}"))),
    }
}

const SELECT_USER: &str = "SELECT id, name, email, created_at, updated_at, version FROM users WHERE id = ?1";

/// User persistence on top of a [`Database`].
#[derive(Clone, Debug)]
pub struct UserStore {
    db: Database,
}

impl UserStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty name or malformed email, `Conflict` if the
    /// email is already taken.
    pub async fn create(&self, name: &str, email: &str) -> Result<User, Error> {
        validate_name(name)?;
        validate_email(email)?;

        let name = name.to_string();
        let email = email.to_string();
        let now = Utc::now();
        let stamp = format_timestamp(now);

        self.db
            .conn
            .call(move |conn| -> Result<User, Error> {
                conn.execute(
                    "INSERT INTO users (name, email, created_at, updated_at, version) VALUES (?1, ?2, ?3, ?3, 1)",
                    params![&name, &email, &stamp],
                )?;
                let id = conn.last_insert_rowid();
                Ok(User { id, name, email, created_at: now, updated_at: now, version: 1 })
            })
            .await
            .map_err(Error::from)
    }

    /// Get a user by id.
    ///
    /// Returns None if the id doesn't exist.
    pub async fn get(&self, id: i64) -> Result<Option<User>, Error> {
        self.db
            .conn
            .call(move |conn| -> Result<Option<User>, Error> {
                let row = conn.query_row(SELECT_USER, params![id], UserRow::from_row).optional()?;
                row.map(User::try_from).transpose()
            })
            .await
            .map_err(Error::from)
    }

    /// Apply a partial update.
    ///
    /// Always moves `updated_at` forward (never backwards, even if the clock
    /// did) and increments `version`. Returns None if the id doesn't exist.
    pub async fn update(&self, id: i64, patch: UserPatch) -> Result<Option<User>, Error> {
        if let Some(name) = &patch.name {
            validate_name(name)?;
        }
        if let Some(email) = &patch.email {
            validate_email(email)?;
        }

        self.db
            .conn
            .call(move |conn| -> Result<Option<User>, Error> {
                let tx = conn.transaction()?;

                let Some(row) = tx.query_row(SELECT_USER, params![id], UserRow::from_row).optional()? else {
                    return Ok(None);
                };
                let previous = row.updated_at.as_deref().and_then(|raw| parse_timestamp(raw).ok());
                let now = previous.map_or_else(Utc::now, |prev| Utc::now().max(prev));

                tx.execute(
                    "UPDATE users SET
                        name = COALESCE(?1, name),
                        email = COALESCE(?2, email),
                        updated_at = ?3,
                        version = version + 1
                    WHERE id = ?4",
                    params![patch.name, patch.email, format_timestamp(now), id],
                )?;

                let updated = tx.query_row(SELECT_USER, params![id], UserRow::from_row)?;
                tx.commit()?;

                User::try_from(updated).map(Some)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a user. Returns false if it did not exist.
    pub async fn delete(&self, id: i64) -> Result<bool, Error> {
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn count(&self) -> Result<u64, Error> {
        self.db
            .conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait]
impl EntityStore for UserStore {
    type Entity = User;

    async fn fetch(&self, entity_id: i64) -> Result<Option<User>, Error> {
        self.get(entity_id).await
    }
}
