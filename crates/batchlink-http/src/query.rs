//! HttpMatchQueryService - IMatchQueryService over `POST /query`
//!
//! The request body is the [`MatchQuery`] itself; the response is
//! `{"rows": [MatchRow]}`.

use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, instrument};

use batchlink_core::domain::ServiceError;
use batchlink_core::ports::{IMatchQueryService, MatchQuery, MatchRow};

use crate::client::BackendClient;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    rows: Vec<MatchRow>,
}

/// Batched lookups run by the backend
pub struct HttpMatchQueryService {
    client: Arc<BackendClient>,
}

impl HttpMatchQueryService {
    /// Creates a new HttpMatchQueryService
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl IMatchQueryService for HttpMatchQueryService {
    #[instrument(skip(self, query), fields(table = %query.table, values = query.values.len()))]
    async fn query(&self, query: &MatchQuery) -> Result<Vec<MatchRow>, ServiceError> {
        let request = self.client.request(Method::POST, "/query").json(query);
        let response: QueryResponse = self.client.send_json(request).await?;

        let width = query.display_paths.len();
        if let Some(row) = response.rows.iter().find(|r| r.display_values.len() != width) {
            return Err(ServiceError::Protocol(format!(
                "row {} carries {} display values, expected {width}",
                row.record_id,
                row.display_values.len()
            )));
        }

        debug!(rows = response.rows.len(), "Query answered");
        Ok(response.rows)
    }
}
