//! Base record service port (driven/secondary port)
//!
//! Fetches and saves the base records attachments are linked to. Saves
//! are optimistic: a record whose version moved on since the fetch is
//! rejected with [`ServiceError::Conflict`].

use crate::domain::{BaseRecord, RecordId, ServiceError};

/// Port trait for base record access
#[async_trait::async_trait]
pub trait IRecordService: Send + Sync {
    /// Fetches a record with its attachment collection
    async fn fetch(&self, table: &str, id: RecordId) -> Result<BaseRecord, ServiceError>;

    /// Saves a record previously fetched
    ///
    /// # Returns
    /// The record as stored by the backend, with ids assigned to new
    /// attachment links and a bumped version
    ///
    /// # Errors
    /// `ServiceError::Conflict` if the stored version differs from
    /// `record.version()`
    async fn save(&self, table: &str, record: &BaseRecord) -> Result<BaseRecord, ServiceError>;
}
