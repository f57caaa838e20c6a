//! Database schema migrations.
//!
//! Each kind of database file has its own ordered migration set. The
//! `_migrations` table records applied versions per set, so a tag file and
//! an entity file each carry only their own tables, and one file holding
//! both still tracks the two sets independently.

use crate::Error;
use tokio_rusqlite::{Connection, params};

/// Which set of tables a database file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    /// `tag_entries`, for the SQLite tag backend.
    Tags,
    /// `users`, for the entity stores.
    Entities,
}

/// Ordered `(version, SQL)` pairs. Every script is `CREATE ... IF NOT EXISTS`.
const TAG_MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/tags/001_tag_entries.sql"))];

const ENTITY_MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/entities/001_users.sql"))];

impl Schema {
    pub fn name(self) -> &'static str {
        match self {
            Self::Tags => "tags",
            Self::Entities => "entities",
        }
    }

    fn migrations(self) -> &'static [(i64, &'static str)] {
        match self {
            Self::Tags => TAG_MIGRATIONS,
            Self::Entities => ENTITY_MIGRATIONS,
        }
    }
}

/// Run any pending migrations of `schema`.
pub async fn run(conn: &Connection, schema: Schema) -> Result<(), Error> {
    conn.call(move |conn| -> Result<(), Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                schema_name TEXT NOT NULL,
                version INTEGER NOT NULL,
                applied_at TEXT NOT NULL,
                PRIMARY KEY (schema_name, version)
            )",
            [],
        )?;

        let current: i64 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations WHERE schema_name = ?1",
            params![schema.name()],
            |row| row.get(0),
        )?;

        let pending: Vec<_> = schema.migrations().iter().filter(|(version, _)| *version > current).collect();
        if pending.is_empty() {
            return Ok(());
        }

        let tx = conn.transaction()?;
        for (version, sql) in pending {
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("{} version {version}: {e}", schema.name())))?;
            tx.execute(
                "INSERT INTO _migrations (schema_name, version, applied_at) VALUES (?1, ?2, ?3)",
                params![schema.name(), version, chrono::Utc::now().to_rfc3339()],
            )?;
            tracing::debug!(schema = schema.name(), version, "applied migration");
        }
        tx.commit()?;

        Ok(())
    })
    .await
    .map_err(Error::from)
}
