//! HttpTokenService - ITokenService over `POST /attachments/upload-tokens`
//!
//! Request: `{"filenames": [..]}`. Response: `[{"token": .., "location": ..}]`
//! in request order. The length check is left to the caller.

use std::sync::Arc;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use batchlink_core::domain::{AssetLocation, ServiceError, UploadToken};
use batchlink_core::ports::ITokenService;

use crate::client::BackendClient;

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    filenames: &'a [String],
}

#[derive(Debug, Deserialize)]
struct TokenEntry {
    token: String,
    location: String,
}

impl TokenEntry {
    fn into_token(self) -> Result<UploadToken, ServiceError> {
        let location =
            AssetLocation::new(self.location).map_err(|e| ServiceError::Protocol(e.to_string()))?;
        UploadToken::new(self.token, location).map_err(|e| ServiceError::Protocol(e.to_string()))
    }
}

/// Upload credentials issued by the backend
pub struct HttpTokenService {
    client: Arc<BackendClient>,
}

impl HttpTokenService {
    /// Creates a new HttpTokenService
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ITokenService for HttpTokenService {
    async fn reserve_tokens(&self, file_names: &[String]) -> Result<Vec<UploadToken>, ServiceError> {
        let request = self
            .client
            .request(Method::POST, "/attachments/upload-tokens")
            .json(&TokenRequest {
                filenames: file_names,
            });
        let entries: Vec<TokenEntry> = self.client.send_json(request).await?;
        debug!(requested = file_names.len(), received = entries.len(), "Tokens issued");

        entries.into_iter().map(TokenEntry::into_token).collect()
    }
}
