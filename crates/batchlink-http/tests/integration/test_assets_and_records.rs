//! Integration tests for the asset store and base record adapters

use serde_json::json;
use wiremock::matchers::{body_bytes, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use batchlink_core::domain::{AssetLocation, RecordId, ServiceError, UploadToken};
use batchlink_core::ports::{IAssetStore, IRecordService};
use batchlink_http::assets::UPLOAD_TOKEN_HEADER;
use batchlink_http::{BackendClient, HttpAssetStore, HttpRecordService};

use crate::common::{self, record_json};

fn token(location: &str) -> UploadToken {
    UploadToken::new("t-1", AssetLocation::new(location.to_string()).unwrap()).unwrap()
}

// ============================================================================
// Asset store
// ============================================================================

#[tokio::test]
async fn test_upload_sends_bytes_with_token() {
    let assets = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/upload"))
        .and(query_param("filename", "100.jpg"))
        .and(header(UPLOAD_TOKEN_HEADER, "t-1"))
        .and(body_bytes(b"jpeg bytes".to_vec()))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "location": "originals/a1.jpg" })),
        )
        .expect(1)
        .mount(&assets)
        .await;

    let client = std::sync::Arc::new(BackendClient::new("http://unused", None));
    let store = HttpAssetStore::new(client, assets.uri());
    let location = store
        .upload(b"jpeg bytes".to_vec(), "100.jpg", &token("originals/a1.jpg"))
        .await
        .unwrap();

    assert_eq!(location.as_str(), "originals/a1.jpg");
}

#[tokio::test]
async fn test_upload_server_error_is_transient() {
    let assets = MockServer::start().await;
    common::mount_status(&assets, "PUT", "/upload", 502).await;

    let client = std::sync::Arc::new(BackendClient::new("http://unused", None));
    let err = HttpAssetStore::new(client, assets.uri())
        .upload(vec![1, 2, 3], "100.jpg", &token("originals/a1.jpg"))
        .await
        .unwrap_err();

    assert!(err.is_transient());
}

#[tokio::test]
async fn test_rate_limited_upload_is_transient() {
    let assets = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
        .mount(&assets)
        .await;

    let client = std::sync::Arc::new(BackendClient::new("http://unused", None));
    let err = HttpAssetStore::new(client, assets.uri())
        .upload(vec![1, 2, 3], "100.jpg", &token("originals/a1.jpg"))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Transport(_)));
}

#[tokio::test]
async fn test_unreachable_asset_server_is_transient() {
    let client = std::sync::Arc::new(BackendClient::new("http://unused", None));
    let err = HttpAssetStore::new(client, "http://127.0.0.1:9")
        .upload(vec![1], "100.jpg", &token("originals/a1.jpg"))
        .await
        .unwrap_err();

    assert!(err.is_transient());
}

// ============================================================================
// Base records
// ============================================================================

#[tokio::test]
async fn test_fetch_keeps_unknown_fields() {
    let (server, client) = common::setup_backend().await;
    common::mount_record(
        &server,
        "collectionobject",
        7,
        record_json(
            7,
            3,
            json!([{ "id": 70, "ordinal": 0, "location": "originals/x.jpg", "fileName": "x.jpg" }]),
        ),
    )
    .await;

    let record = HttpRecordService::new(client)
        .fetch("collectionobject", RecordId::new(7))
        .await
        .unwrap();

    assert_eq!(record.version(), 3);
    assert_eq!(record.attachments().len(), 1);
    assert_eq!(record.fields()["remarks"], json!("collected 2019"));
}

#[tokio::test]
async fn test_save_sends_whole_record_and_returns_stored_copy() {
    let (server, client) = common::setup_backend().await;
    common::mount_record(&server, "collectionobject", 7, record_json(7, 3, json!([]))).await;
    Mock::given(method("PUT"))
        .and(path("/records/collectionobject/7"))
        .and(body_partial_json(json!({
            "version": 3,
            "remarks": "collected 2019",
            "attachments": [{ "ordinal": 0, "location": "originals/a1.jpg", "fileName": "100.jpg" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(record_json(
            7,
            4,
            json!([{ "id": 71, "ordinal": 0, "location": "originals/a1.jpg", "fileName": "100.jpg" }]),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let service = HttpRecordService::new(client);
    let mut record = service
        .fetch("collectionobject", RecordId::new(7))
        .await
        .unwrap();
    record.append_attachment(AssetLocation::new("originals/a1.jpg".into()).unwrap(), "100.jpg");
    let saved = service.save("collectionobject", &record).await.unwrap();

    assert_eq!(saved.version(), 4);
    assert_eq!(saved.attachments()[0].id.map(|id| id.as_i64()), Some(71));
}

#[tokio::test]
async fn test_save_conflict_is_classified() {
    let (server, client) = common::setup_backend().await;
    common::mount_record(&server, "collectionobject", 7, record_json(7, 3, json!([]))).await;
    common::mount_status(&server, "PUT", "/records/collectionobject/7", 409).await;

    let service = HttpRecordService::new(client);
    let record = service
        .fetch("collectionobject", RecordId::new(7))
        .await
        .unwrap();
    let err = service.save("collectionobject", &record).await.unwrap_err();

    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_fetch_missing_record_is_not_found() {
    let (server, client) = common::setup_backend().await;
    common::mount_status(&server, "GET", "/records/collectionobject/9", 404).await;

    let err = HttpRecordService::new(client)
        .fetch("collectionobject", RecordId::new(9))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn test_fetch_wrong_record_is_protocol_error() {
    let (server, client) = common::setup_backend().await;
    common::mount_record(&server, "collectionobject", 7, record_json(8, 1, json!([]))).await;

    let err = HttpRecordService::new(client)
        .fetch("collectionobject", RecordId::new(7))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Protocol(_)));
}

#[tokio::test]
async fn test_forbidden_save_is_rejected() {
    let (server, client) = common::setup_backend().await;
    common::mount_status(&server, "PUT", "/records/collectionobject/7", 403).await;

    let record = batchlink_core::domain::BaseRecord::new(RecordId::new(7), 1, Vec::new());
    let err = HttpRecordService::new(client)
        .save("collectionobject", &record)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Rejected(_)));
}
