//! Matching query port (driven/secondary port)
//!
//! A narrow "value IN (...)" lookup against one backend table. The
//! Matcher uses it to find the records whose identifying field equals the
//! parsed file-name identifiers; Reconciliation uses the same shape to look
//! up attachment sub-records by location or id.
//!
//! ## Design Notes
//!
//! - Errors are classified [`ServiceError`]s so callers can tell a
//!   transient outage from a rejected query.
//! - The query language used by the backend is opaque to the core.

use serde::{Deserialize, Serialize};

use crate::domain::{RecordId, ServiceError};

/// A batched lookup request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchQuery {
    /// Table to search
    pub table: String,
    /// Field path compared against `values`
    pub field_path: String,
    /// Values to match exactly
    pub values: Vec<String>,
    /// Extra field paths returned with every row
    #[serde(default)]
    pub display_paths: Vec<String>,
}

impl MatchQuery {
    /// Creates a query without display columns
    pub fn new(table: impl Into<String>, field_path: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            table: table.into(),
            field_path: field_path.into(),
            values,
            display_paths: Vec::new(),
        }
    }

    /// Requests additional display columns
    pub fn with_display_paths(mut self, paths: Vec<String>) -> Self {
        self.display_paths = paths;
        self
    }
}

/// One matched row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRow {
    /// Id of the matched row
    pub record_id: RecordId,
    /// Value of the compared field
    pub key_value: String,
    /// Values of the requested display paths, in request order
    #[serde(default)]
    pub display_values: Vec<Option<String>>,
}

/// Port trait for the batched matching query service
#[async_trait::async_trait]
pub trait IMatchQueryService: Send + Sync {
    /// Runs one batched lookup
    ///
    /// # Returns
    /// Every row whose `field_path` equals one of `values`, in backend order
    async fn query(&self, query: &MatchQuery) -> Result<Vec<MatchRow>, ServiceError>;
}
