//! Catalog database: pool construction and embedded migrations.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

// Enrichment workers fan reads out over the pool; SQLite serializes the
// writes anyway, so a handful of connections is plenty.
const MAX_CONNECTIONS: u32 = 4;
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle to the catalog database.
///
/// The catalog is the authority: match state, manual edits and reading
/// history live only here. Everything else in it can be rebuilt from the
/// files and the sources, which is why migrations run unconditionally on
/// every connect.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if necessary) and migrate the catalog at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = Self::options().filename(path.as_ref()).create_if_missing(true);
        Self::open(options, MAX_CONNECTIONS).await
    }

    /// Open a throwaway in-memory catalog. Lives here rather than behind
    /// `#[cfg(test)]` so downstream crates can test against it too.
    pub async fn connect_in_memory() -> Result<Self> {
        // One connection only: an in-memory database is per-connection, and
        // a pool of them would be a pool of different empty databases.
        Self::open(Self::options().filename(":memory:"), 1).await
    }

    async fn open(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            // Session pragmas must land on every pooled connection.
            .after_connect(|conn, _meta| Box::pin(Self::tune_session(conn)))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        MIGRATOR.run(&pool).await.or_raise(|| ErrorKind::Migration)?;
        Ok(Self { pool })
    }

    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // WAL lets stats and listings read while a scan writes.
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT)
    }

    async fn tune_session(conn: &mut SqliteConnection) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA temp_store = MEMORY;
                PRAGMA cache_size = -4096;
                PRAGMA mmap_size = 16777216;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        // Give the query planner a chance to refresh its statistics.
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
