//! SQLite connection management with pragma configuration.
//!
//! Both the tag store's live backend and the user store sit on a
//! [`Database`]. Opening applies the WAL pragmas so several processes can
//! share one tag file, then runs the pending migrations of the requested
//! [`Schema`].

pub mod migrations;

pub use migrations::Schema;

use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA busy_timeout=2000;
     PRAGMA foreign_keys=ON;";

/// Database handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread. Cloning shares the same connection.
#[derive(Clone, Debug)]
pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations of `schema`.
    pub async fn open(path: impl AsRef<Path>, schema: Schema) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn, schema).await
    }

    /// Open an in-memory database for testing.
    pub async fn open_in_memory(schema: Schema) -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn, schema).await
    }

    async fn prepare(conn: Connection, schema: Schema) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn, schema).await?;

        Ok(Self { conn })
    }

    /// Cheap round trip used by liveness probes.
    pub async fn ping(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Close the underlying connection.
    ///
    /// Other clones of this handle fail with `ConnectionClosed` afterwards.
    pub async fn close(&self) {
        if let Err(e) = self.conn.clone().close().await {
            tracing::warn!(error = %e, "error while closing database");
        }
    }
}
