//! HttpSessionStore - ISessionStore over the backend's session endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `get`     | `GET /sessions/{id}` (404 → `None`) |
//! | `put`     | `PUT /sessions/{id}` with the session as body |
//! | `delete`  | `DELETE /sessions/{id}` (404 is not an error) |
//! | `list`    | `GET /sessions` → `[SessionMeta]` |

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Method;
use tracing::debug;

use batchlink_core::domain::{BatchSession, SessionId, SessionMeta};
use batchlink_core::ports::ISessionStore;

use crate::client::BackendClient;
use crate::HttpError;

/// Session store kept by the backend
pub struct HttpSessionStore {
    client: Arc<BackendClient>,
}

impl HttpSessionStore {
    /// Creates a new HttpSessionStore
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ISessionStore for HttpSessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<BatchSession>> {
        let request = self.client.request(Method::GET, &format!("/sessions/{id}"));
        match self.client.send_json::<BatchSession>(request).await {
            Ok(session) => Ok(Some(session)),
            Err(HttpError::NotFound(_)) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to fetch session {id}")),
        }
    }

    async fn put(&self, session: &BatchSession) -> Result<()> {
        let request = self
            .client
            .request(Method::PUT, &format!("/sessions/{}", session.id()))
            .json(session);
        self.client
            .send(request)
            .await
            .with_context(|| format!("Failed to store session {}", session.id()))?;
        debug!(session_id = %session.id(), status = %session.status(), "Session stored");
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<()> {
        let request = self.client.request(Method::DELETE, &format!("/sessions/{id}"));
        match self.client.send(request).await {
            Ok(_) | Err(HttpError::NotFound(_)) => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete session {id}")),
        }
    }

    async fn list(&self) -> Result<Vec<SessionMeta>> {
        let request = self.client.request(Method::GET, "/sessions");
        let mut metas: Vec<SessionMeta> = self
            .client
            .send_json(request)
            .await
            .context("Failed to list sessions")?;
        metas.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(metas)
    }
}
