//! Integration tests for the matching query and token adapters

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use batchlink_core::domain::{RecordId, ServiceError};
use batchlink_core::ports::{IMatchQueryService, ITokenService, MatchQuery};
use batchlink_http::{HttpMatchQueryService, HttpTokenService};

use crate::common;

#[tokio::test]
async fn test_query_posts_batched_lookup() {
    let (server, client) = common::setup_backend().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_json(json!({
            "table": "collectionobject",
            "fieldPath": "catalogNumber",
            "values": ["100", "200"],
            "displayPaths": ["collectingEvent.startDate"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [
                { "recordId": 1, "keyValue": "100", "displayValues": ["2019-04-01"] },
                { "recordId": 2, "keyValue": "200", "displayValues": [null] },
                { "recordId": 3, "keyValue": "200", "displayValues": ["2020-06-12"] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let query = MatchQuery::new(
        "collectionobject",
        "catalogNumber",
        vec!["100".to_string(), "200".to_string()],
    )
    .with_display_paths(vec!["collectingEvent.startDate".to_string()]);
    let rows = HttpMatchQueryService::new(client).query(&query).await.unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].record_id, RecordId::new(1));
    assert_eq!(rows[1].display_values, vec![None]);
    assert_eq!(rows[2].key_value, "200");
}

#[tokio::test]
async fn test_query_rejects_ragged_display_values() {
    let (server, client) = common::setup_backend().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [{ "recordId": 1, "keyValue": "100", "displayValues": [] }]
        })))
        .mount(&server)
        .await;

    let query = MatchQuery::new("collectionobject", "catalogNumber", vec!["100".into()])
        .with_display_paths(vec!["remarks".to_string()]);
    let err = HttpMatchQueryService::new(client)
        .query(&query)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Protocol(_)));
}

#[tokio::test]
async fn test_query_outage_is_transient() {
    let (server, client) = common::setup_backend().await;
    common::mount_status(&server, "POST", "/query", 503).await;

    let query = MatchQuery::new("collectionobject", "catalogNumber", vec!["100".into()]);
    let err = HttpMatchQueryService::new(client)
        .query(&query)
        .await
        .unwrap_err();

    assert!(err.is_transient());
}

#[tokio::test]
async fn test_tokens_returned_in_request_order() {
    let (server, client) = common::setup_backend().await;
    Mock::given(method("POST"))
        .and(path("/attachments/upload-tokens"))
        .and(body_json(json!({ "filenames": ["100.jpg", "200.jpg"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "token": "t-1", "location": "originals/a1.jpg" },
            { "token": "t-2", "location": "originals/b2.jpg" }
        ])))
        .mount(&server)
        .await;

    let tokens = HttpTokenService::new(client)
        .reserve_tokens(&["100.jpg".to_string(), "200.jpg".to_string()])
        .await
        .unwrap();

    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].token(), "t-1");
    assert_eq!(tokens[1].location().as_str(), "originals/b2.jpg");
}

#[tokio::test]
async fn test_short_token_response_is_passed_through() {
    let (server, client) = common::setup_backend().await;
    Mock::given(method("POST"))
        .and(path("/attachments/upload-tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "token": "t-1", "location": "originals/a1.jpg" }
        ])))
        .mount(&server)
        .await;

    let tokens = HttpTokenService::new(client)
        .reserve_tokens(&["100.jpg".to_string(), "200.jpg".to_string()])
        .await
        .unwrap();

    assert_eq!(tokens.len(), 1);
}

#[tokio::test]
async fn test_malformed_token_is_protocol_error() {
    let (server, client) = common::setup_backend().await;
    Mock::given(method("POST"))
        .and(path("/attachments/upload-tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "token": "t-1", "location": "" }
        ])))
        .mount(&server)
        .await;

    let err = HttpTokenService::new(client)
        .reserve_tokens(&["100.jpg".to_string()])
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Protocol(_)));
}
