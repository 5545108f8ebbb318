//! HttpRecordService - IRecordService over `/records/{table}/{id}`
//!
//! `GET` returns the record; `PUT` stores it and returns the stored copy.
//! The backend answers 409 when the record's version moved on.

use std::sync::Arc;

use reqwest::Method;
use tracing::{debug, instrument};

use batchlink_core::domain::{BaseRecord, RecordId, ServiceError};
use batchlink_core::ports::IRecordService;

use crate::client::BackendClient;

/// Base records served by the backend
pub struct HttpRecordService {
    client: Arc<BackendClient>,
}

impl HttpRecordService {
    /// Creates a new HttpRecordService
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl IRecordService for HttpRecordService {
    #[instrument(skip(self))]
    async fn fetch(&self, table: &str, id: RecordId) -> Result<BaseRecord, ServiceError> {
        let request = self
            .client
            .request(Method::GET, &format!("/records/{table}/{id}"));
        let record: BaseRecord = self.client.send_json(request).await?;
        if record.id() != id {
            return Err(ServiceError::Protocol(format!(
                "asked for record {id}, received {}",
                record.id()
            )));
        }
        Ok(record)
    }

    #[instrument(skip(self, record), fields(id = %record.id(), version = record.version()))]
    async fn save(&self, table: &str, record: &BaseRecord) -> Result<BaseRecord, ServiceError> {
        let request = self
            .client
            .request(Method::PUT, &format!("/records/{table}/{}", record.id()))
            .json(record);
        let saved: BaseRecord = self.client.send_json(request).await?;
        debug!(version = saved.version(), "Record saved");
        Ok(saved)
    }
}
