//! SQLite pool for the session store
//!
//! A file database runs in WAL mode with a small pool; the in-memory variant
//! used by tests is pinned to one connection since every SQLite memory
//! connection opens a database of its own. Both apply the session schema
//! before they are handed out.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::CacheError;

/// Connections kept for a file database
const FILE_POOL_SIZE: u32 = 4;

/// How long a writer waits on a locked database
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SESSIONS_SCHEMA: &str = include_str!("migrations/20260301_sessions.sql");

/// Pooled connections to the session database
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens the session database at `db_path`, creating it and its
    /// directory when missing
    ///
    /// # Errors
    ///
    /// `CacheError::ConnectionFailed` when the directory or the database
    /// cannot be opened, `CacheError::MigrationFailed` when the schema
    /// cannot be applied.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| {
                CacheError::ConnectionFailed(format!("Cannot create {}: {e}", dir.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = Self::open(options, FILE_POOL_SIZE, &db_path.display().to_string()).await?;

        tracing::info!(path = %db_path.display(), "Session database opened");
        Ok(pool)
    }

    /// Opens an empty session database that lives as long as the pool
    pub async fn in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;
        let pool = Self::open(options, 1, "memory").await?;

        tracing::debug!("In-memory session database opened");
        Ok(pool)
    }

    async fn open(
        options: SqliteConnectOptions,
        max_connections: u32,
        label: &str,
    ) -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("{label}: {e}")))?;

        sqlx::raw_sql(SESSIONS_SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(format!("{label}: {e}")))?;

        Ok(Self { pool })
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every connection, checkpointing the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
