//! SQLite implementation of ISessionStore
//!
//! Sessions are stored whole as a JSON payload. The listing columns are
//! written alongside so that `list` reads them without decoding payloads.
//!
//! ## Type Mapping
//!
//! | Domain Type    | SQL Type | Strategy                                   |
//! |----------------|----------|--------------------------------------------|
//! | SessionId      | TEXT     | UUID string via `.to_string()` / `FromStr` |
//! | SessionStatus  | TEXT     | `.as_str()` / `FromStr`                    |
//! | DateTime<Utc>  | TEXT     | ISO 8601, nanosecond precision             |
//! | BatchSession   | TEXT     | serde_json serialization                   |

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use batchlink_core::domain::{BatchSession, SessionId, SessionMeta, SessionStatus};
use batchlink_core::ports::ISessionStore;

use crate::CacheError;

/// SQLite-based implementation of the session store port
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Creates a new store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Row conversion
// ============================================================================

/// Fixed-width timestamps so that text ordering is chronological
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::SerializationError(format!("Invalid datetime '{}': {}", s, e)))
}

fn session_from_row(row: &SqliteRow) -> Result<BatchSession, CacheError> {
    let payload: String = row.get("payload");
    Ok(serde_json::from_str(&payload)?)
}

fn meta_from_row(row: &SqliteRow) -> Result<SessionMeta, CacheError> {
    let id_str: String = row.get("id");
    let status_str: String = row.get("status");
    let item_count: i64 = row.get("item_count");
    let updated_at_str: String = row.get("updated_at");

    let id = SessionId::from_str(&id_str).map_err(|e| {
        CacheError::SerializationError(format!("Invalid SessionId '{}': {}", id_str, e))
    })?;
    let status = SessionStatus::from_str(&status_str).map_err(|e| {
        CacheError::SerializationError(format!("Invalid status '{}': {}", status_str, e))
    })?;

    Ok(SessionMeta {
        id,
        name: row.get("name"),
        status,
        item_count: usize::try_from(item_count).unwrap_or_default(),
        updated_at: parse_datetime(&updated_at_str)?,
    })
}

// ============================================================================
// ISessionStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ISessionStore for SqliteSessionStore {
    async fn get(&self, id: &SessionId) -> anyhow::Result<Option<BatchSession>> {
        let row = sqlx::query("SELECT payload FROM batch_sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(session_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, session: &BatchSession) -> anyhow::Result<()> {
        let id = session.id().to_string();
        let payload = serde_json::to_string(session)
            .map_err(|e| anyhow::anyhow!("Failed to serialize session: {}", e))?;

        sqlx::query(
            "INSERT INTO batch_sessions \
             (id, name, status, item_count, payload, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             name = excluded.name, status = excluded.status, \
             item_count = excluded.item_count, payload = excluded.payload, \
             updated_at = excluded.updated_at",
        )
        .bind(&id)
        .bind(session.name())
        .bind(session.status().as_str())
        .bind(session.batch().len() as i64)
        .bind(&payload)
        .bind(format_datetime(session.created_at()))
        .bind(format_datetime(session.updated_at()))
        .execute(&self.pool)
        .await?;

        tracing::trace!(session_id = %id, status = session.status().as_str(), "Saved session");
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> anyhow::Result<()> {
        let result = sqlx::query("DELETE FROM batch_sessions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        tracing::trace!(session_id = %id, removed = result.rows_affected(), "Deleted session");
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<SessionMeta>> {
        let rows = sqlx::query(
            "SELECT id, name, status, item_count, updated_at FROM batch_sessions \
             ORDER BY updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let metas = rows
            .iter()
            .map(meta_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(metas)
    }
}
