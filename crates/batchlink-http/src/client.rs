//! Backend HTTP client
//!
//! Provides a thin authenticated wrapper over `reqwest` shared by every
//! adapter in this crate. Handles base URL construction, bearer tokens,
//! status classification and JSON decoding.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use batchlink_http::{BackendClient, HttpRecordService};
//!
//! let client = Arc::new(BackendClient::new("https://example.org/api", Some("token".into())));
//! let records = HttpRecordService::new(client);
//! ```

use batchlink_core::config::BackendConfig;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::HttpError;

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for the backend REST API
///
/// Wraps `reqwest::Client` with the base URL and optional bearer token.
/// Cheap to share behind an `Arc`; the adapters hold one each.
#[derive(Debug, Clone)]
pub struct BackendClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests, without trailing slash
    base_url: String,
    /// Bearer token sent with every request, if any
    api_token: Option<String>,
}

impl BackendClient {
    /// Creates a new BackendClient
    ///
    /// # Arguments
    /// * `base_url` - API root (e.g. `https://backend.example.org/api`)
    /// * `api_token` - Optional bearer token
    pub fn new(base_url: impl Into<String>, api_token: Option<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    /// Creates a client for the API described by `config`
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.base_url.clone(), config.api_token.clone())
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns whether requests carry a bearer token
    pub fn has_token(&self) -> bool {
        self.api_token.is_some()
    }

    /// Creates an authenticated request builder for a path under the base URL
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to base URL (e.g. "/sessions")
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, &format!("{}{}", self.base_url, path))
    }

    /// Creates an authenticated request builder for an absolute URL
    pub fn request_url(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends a request and returns the response if its status is a success
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, HttpError> {
        let response = request.send().await.map_err(map_send_error)?;
        check_status(response).await
    }

    /// Sends a request and decodes a JSON success body
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, HttpError> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| HttpError::InvalidResponse(e.to_string()))
    }
}

/// Classifies a failure to get any response at all
fn map_send_error(err: reqwest::Error) -> HttpError {
    if err.is_builder() {
        HttpError::BadRequest(err.to_string())
    } else {
        HttpError::NetworkError(err)
    }
}

/// Passes success responses through and classifies the rest
pub(crate) async fn check_status(response: Response) -> Result<Response, HttpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().path().to_string();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }

    debug!(status = status.as_u16(), url, "Backend returned error status");
    Err(classify_status(status, format!("{url}: {body}")))
}

/// Maps an error status to an [`HttpError`]
///
/// A 429 is treated like a 5xx: the work loop's own backoff decides when to
/// try again.
pub fn classify_status(status: StatusCode, message: String) -> HttpError {
    match status {
        StatusCode::UNAUTHORIZED => HttpError::Unauthorized(message),
        StatusCode::FORBIDDEN => HttpError::Forbidden(message),
        StatusCode::NOT_FOUND => HttpError::NotFound(message),
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => HttpError::Conflict(message),
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            HttpError::ServerError(format!("{}: {message}", s.as_u16()))
        }
        s => HttpError::BadRequest(format!("{}: {message}", s.as_u16())),
    }
}
