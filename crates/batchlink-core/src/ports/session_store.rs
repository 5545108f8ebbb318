//! Session store port (driven/secondary port)
//!
//! This module defines the interface for persisting batch sessions so an
//! interrupted batch can be reopened and reconciled later.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (SQLite, remote document store) and never drive per-item outcomes.
//! - `put` is an upsert keyed by the session's own id.

use crate::domain::{BatchSession, SessionId, SessionMeta};

/// Port trait for batch session persistence
#[async_trait::async_trait]
pub trait ISessionStore: Send + Sync {
    /// Retrieves a session by its ID
    ///
    /// # Returns
    /// `None` if no session with that ID is stored
    async fn get(&self, id: &SessionId) -> anyhow::Result<Option<BatchSession>>;

    /// Saves a session (insert or update)
    async fn put(&self, session: &BatchSession) -> anyhow::Result<()>;

    /// Deletes a session by its ID
    ///
    /// Deleting a session that does not exist is not an error.
    async fn delete(&self, id: &SessionId) -> anyhow::Result<()>;

    /// Lists the stored sessions, most recently updated first
    async fn list(&self) -> anyhow::Result<Vec<SessionMeta>>;
}
