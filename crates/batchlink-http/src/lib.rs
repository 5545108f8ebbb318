//! Batchlink HTTP - REST adapters for the backend services
//!
//! Provides async adapters for:
//! - Batch session storage on the backend
//! - Batched matching queries
//! - Upload token reservation
//! - Asset uploads
//! - Base record fetch/save with optimistic concurrency
//!
//! ## Modules
//!
//! - [`client`] - Authenticated HTTP client and status classification
//! - [`session_store`] - `ISessionStore` over `/sessions`
//! - [`query`] - `IMatchQueryService` over `/query`
//! - [`tokens`] - `ITokenService` over `/attachments/upload-tokens`
//! - [`assets`] - `IAssetStore` against the asset server
//! - [`records`] - `IRecordService` over `/records/{table}/{id}`
//!
//! ## Wire format
//!
//! Every body is camelCase JSON. Status codes are classified by
//! [`HttpError`] and reach the core as [`ServiceError`]s.

pub mod assets;
pub mod client;
pub mod query;
pub mod records;
pub mod session_store;
pub mod tokens;

use batchlink_core::domain::ServiceError;
use thiserror::Error;

pub use assets::HttpAssetStore;
pub use client::BackendClient;
pub use query::HttpMatchQueryService;
pub use records::HttpRecordService;
pub use session_store::HttpSessionStore;
pub use tokens::HttpTokenService;

/// Errors that can occur when communicating with the backend
#[derive(Debug, Error)]
pub enum HttpError {
    /// Authentication credentials are invalid or missing
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The record changed since it was fetched
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A server-side error occurred (5xx), or the server is rate limiting
    #[error("Server error: {0}")]
    ServerError(String),

    /// The request was refused for another reason (other 4xx)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<HttpError> for ServiceError {
    fn from(err: HttpError) -> Self {
        let message = err.to_string();
        match err {
            HttpError::NotFound(_) => ServiceError::NotFound(message),
            HttpError::Conflict(_) => ServiceError::Conflict(message),
            HttpError::ServerError(_) | HttpError::NetworkError(_) => {
                ServiceError::Transport(message)
            }
            HttpError::InvalidResponse(_) => ServiceError::Protocol(message),
            HttpError::Unauthorized(_) | HttpError::Forbidden(_) | HttpError::BadRequest(_) => {
                ServiceError::Rejected(message)
            }
        }
    }
}
