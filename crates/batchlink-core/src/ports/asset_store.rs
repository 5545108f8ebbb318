//! Asset store port (driven/secondary port)
//!
//! Stores file bytes and returns the stable location they can be referenced
//! by. The storage wire protocol is opaque to the core.

use crate::domain::{AssetLocation, ServiceError, UploadToken};

/// Port trait for asset storage
#[async_trait::async_trait]
pub trait IAssetStore: Send + Sync {
    /// Uploads file bytes with a previously reserved credential
    ///
    /// # Arguments
    /// * `bytes` - File contents
    /// * `file_name` - Original file name
    /// * `token` - Credential reserved for this file
    ///
    /// # Returns
    /// The stable location of the stored asset
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        token: &UploadToken,
    ) -> Result<AssetLocation, ServiceError>;
}
