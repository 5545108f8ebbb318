//! Shared test helpers for backend integration tests
//!
//! Each helper mounts the endpoints a test needs on a wiremock server and
//! returns adapters pointed at it.

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use batchlink_http::BackendClient;

pub const TEST_TOKEN: &str = "test-api-token";

/// Starts a mock server and returns a client pointing at it
pub async fn setup_backend() -> (MockServer, Arc<BackendClient>) {
    let server = MockServer::start().await;
    let client = Arc::new(BackendClient::new(server.uri(), Some(TEST_TOKEN.to_string())));
    (server, client)
}

/// JSON for a base record with the given attachment links
pub fn record_json(id: i64, version: i64, attachments: Value) -> Value {
    json!({
        "id": id,
        "version": version,
        "attachments": attachments,
        "catalogNumber": format!("{id:09}"),
        "remarks": "collected 2019"
    })
}

/// Mounts `GET /records/{table}/{id}` returning `body`
pub async fn mount_record(server: &MockServer, table: &str, id: i64, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/records/{table}/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts an endpoint answering every request with `status`
pub async fn mount_status(server: &MockServer, http_method: &str, endpoint: &str, status: u16) {
    Mock::given(method(http_method))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(status).set_body_string("backend says no"))
        .mount(server)
        .await;
}
