//! Token service port (driven/secondary port)
//!
//! Issues asset-store upload credentials in bulk.

use crate::domain::{ServiceError, UploadToken};

/// Port trait for upload credential reservation
#[async_trait::async_trait]
pub trait ITokenService: Send + Sync {
    /// Reserves one credential per file name
    ///
    /// # Arguments
    /// * `file_names` - Names of the files about to be uploaded
    ///
    /// # Returns
    /// Credentials in the same order as `file_names`. Callers must treat a
    /// response of a different length as a protocol violation.
    async fn reserve_tokens(&self, file_names: &[String]) -> Result<Vec<UploadToken>, ServiceError>;
}
