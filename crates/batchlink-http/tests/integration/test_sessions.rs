//! Integration tests for the session store adapter

use serde_json::json;
use wiremock::matchers::{bearer_token, body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use batchlink_core::domain::{
    BatchSession, IdentifierFormat, SessionId, SessionStatus, SourceFile, WorkBatch, WorkItem,
};
use batchlink_core::ports::ISessionStore;
use batchlink_http::HttpSessionStore;

use crate::common::{self, TEST_TOKEN};

fn session() -> BatchSession {
    let item = WorkItem::from_source(SourceFile::new("/photos/100.jpg", 10), &IdentifierFormat::Text);
    BatchSession::new("field trip", WorkBatch::new(vec![item]))
}

#[tokio::test]
async fn test_put_then_get_round_trips_through_backend() {
    let (server, client) = common::setup_backend().await;
    let session = session();
    let endpoint = format!("/sessions/{}", session.id());

    Mock::given(method("PUT"))
        .and(path(endpoint.as_str()))
        .and(bearer_token(TEST_TOKEN))
        .and(body_partial_json(json!({ "name": "field trip", "status": "idle" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(endpoint.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(&session))
        .mount(&server)
        .await;

    let store = HttpSessionStore::new(client);
    store.put(&session).await.unwrap();
    let fetched = store.get(session.id()).await.unwrap().unwrap();

    assert_eq!(fetched, session);
}

#[tokio::test]
async fn test_get_missing_session_is_none() {
    let (server, client) = common::setup_backend().await;
    let id = SessionId::new();
    common::mount_status(&server, "GET", &format!("/sessions/{id}"), 404).await;

    let store = HttpSessionStore::new(client);
    assert!(store.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_tolerates_missing_session() {
    let (server, client) = common::setup_backend().await;
    let id = SessionId::new();
    common::mount_status(&server, "DELETE", &format!("/sessions/{id}"), 404).await;

    HttpSessionStore::new(client).delete(&id).await.unwrap();
}

#[tokio::test]
async fn test_list_is_sorted_newest_first() {
    let (server, client) = common::setup_backend().await;
    let older = SessionId::new();
    let newer = SessionId::new();
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": older.to_string(),
                "name": "older",
                "status": "idle",
                "itemCount": 3,
                "updatedAt": "2026-01-10T08:00:00Z"
            },
            {
                "id": newer.to_string(),
                "name": "newer",
                "status": "uploadInterrupted",
                "itemCount": 12,
                "updatedAt": "2026-02-01T08:00:00Z"
            }
        ])))
        .mount(&server)
        .await;

    let metas = HttpSessionStore::new(client).list().await.unwrap();

    assert_eq!(metas.len(), 2);
    assert_eq!(metas[0].id, newer);
    assert_eq!(metas[0].status, SessionStatus::UploadInterrupted);
    assert_eq!(metas[1].item_count, 3);
}

#[tokio::test]
async fn test_server_error_surfaces_as_error() {
    let (server, client) = common::setup_backend().await;
    common::mount_status(&server, "GET", "/sessions", 500).await;

    assert!(HttpSessionStore::new(client).list().await.is_err());
}
