//! HttpAssetStore - IAssetStore against the asset server
//!
//! Bytes are sent with `PUT {asset_url}/upload?filename=..` carrying the
//! reserved credential in the `X-Upload-Token` header. The server answers
//! `{"location": ..}`.

use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use batchlink_core::domain::{AssetLocation, ServiceError, UploadToken};
use batchlink_core::ports::IAssetStore;

use crate::client::BackendClient;

/// Header carrying the upload credential
pub const UPLOAD_TOKEN_HEADER: &str = "X-Upload-Token";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    location: String,
}

/// Asset server reached over HTTP
pub struct HttpAssetStore {
    client: Arc<BackendClient>,
    asset_url: String,
}

impl HttpAssetStore {
    /// Creates a new HttpAssetStore
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client (its bearer token is sent too)
    /// * `asset_url` - Root URL of the asset server
    pub fn new(client: Arc<BackendClient>, asset_url: impl Into<String>) -> Self {
        let asset_url: String = asset_url.into();
        Self {
            client,
            asset_url: asset_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl IAssetStore for HttpAssetStore {
    #[instrument(skip(self, bytes, token), fields(bytes = bytes.len()))]
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        token: &UploadToken,
    ) -> Result<AssetLocation, ServiceError> {
        let request = self
            .client
            .request_url(Method::PUT, &format!("{}/upload", self.asset_url))
            .query(&[("filename", file_name)])
            .header(UPLOAD_TOKEN_HEADER, token.token())
            .header("Content-Type", "application/octet-stream")
            .body(bytes);
        let response: UploadResponse = self.client.send_json(request).await?;
        let location =
            AssetLocation::new(response.location).map_err(|e| ServiceError::Protocol(e.to_string()))?;

        if &location != token.location() {
            warn!(
                reserved = %token.location(),
                stored = %location,
                "Asset stored at a different location than reserved"
            );
        }
        debug!(location = %location, "Asset uploaded");
        Ok(location)
    }
}
