//! Integration tests for the Rankify API client against a mock server
//!
//! Covers bulk-create status handling, the recalc flag, error message
//! extraction, timeouts, and category listing and resolution.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{csv_with_rows, memory_source, test_config};
use rankify_import::record::RecordMapper;
use rankify_import::{
    ApiClient, ApiConfig, Batch, ImportError, ImportMode, Importer, RawRecord, SinkError,
    UploadSink,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn client(server: &MockServer) -> ApiClient {
    client_with(server, |_| {})
}

fn client_with(server: &MockServer, tweak: impl FnOnce(&mut ApiConfig)) -> ApiClient {
    let mut config = ApiConfig {
        base_url: format!("{}/api", server.uri()),
        token: Some("admin-session".to_string()),
        timeout_secs: 5,
    };
    tweak(&mut config);
    ApiClient::new(&config).unwrap()
}

fn batch(mode: ImportMode, names: &[&str], is_final: bool) -> Batch {
    let mapper = RecordMapper::new(mode, 5);
    let records = names
        .iter()
        .map(|name| {
            let raw: RawRecord = [("name", *name), ("state", "Texas"), ("phone", "(512) 555-0199")]
                .into_iter()
                .collect();
            mapper.map(&raw).normalize()
        })
        .collect();
    Batch::new(0, records, is_final)
}

fn categories(ids: std::ops::Range<i64>) -> Value {
    Value::Array(
        ids.map(|id| json!({ "id": id, "name": format!("Category {}", id), "slug": format!("category-{}", id) }))
            .collect(),
    )
}

#[tokio::test]
async fn test_bulk_create_sends_records_with_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/businesses/bulk_create/"))
        .and(query_param("recalc", "0"))
        .and(header("Authorization", "Bearer admin-session"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "created": 2 })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client(&server)
        .deliver(ImportMode::Business, &batch(ImportMode::Business, &["A", "B"], false))
        .await
        .unwrap();
    assert_eq!(created, 2);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["name"], "A");
    assert_eq!(items[0]["state"], "TX");
    assert_eq!(items[0]["phone"], "+15125550199");
    assert_eq!(items[0]["category_id"], 5);
    assert_eq!(items[0]["status"], "active");
    assert_eq!(items[0]["is_premium"], false);
}

#[tokio::test]
async fn test_final_batch_requests_recalc_on_provider_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/doctors/bulk_create/"))
        .and(query_param("recalc", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "created": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client(&server)
        .deliver(ImportMode::Provider, &batch(ImportMode::Provider, &["Dr. Who"], true))
        .await
        .unwrap();
    assert_eq!(created, 1);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["items"][0]["provider_name"], "Dr. Who");
}

#[tokio::test]
async fn test_missing_created_count_defaults_to_batch_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&server)
        .await;

    let created = client(&server)
        .deliver(ImportMode::Business, &batch(ImportMode::Business, &["A", "B", "C"], false))
        .await
        .unwrap();
    assert_eq!(created, 3);
}

#[tokio::test]
async fn test_session_expiry_statuses_are_unauthorized() {
    for (status, location) in [(401, None), (403, None), (302, Some("/accounts/login/"))] {
        let server = MockServer::start().await;
        let mut response = ResponseTemplate::new(status);
        if let Some(location) = location {
            response = response.insert_header("Location", location);
        }
        Mock::given(method("POST")).respond_with(response).mount(&server).await;

        let err = client(&server)
            .deliver(ImportMode::Business, &batch(ImportMode::Business, &["A"], false))
            .await
            .unwrap_err();
        assert_eq!(err, SinkError::Unauthorized { status });
        assert!(!err.is_retryable());
    }
}

#[tokio::test]
async fn test_structured_error_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(json!({ "detail": "Another bulk import is currently running." })),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .deliver(ImportMode::Business, &batch(ImportMode::Business, &["A"], false))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SinkError::rejected(Some(409), "Another bulk import is currently running.")
    );
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_html_error_page_falls_back_to_status_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html><body>Bad Gateway</body></html>"))
        .mount(&server)
        .await;

    let err = client(&server)
        .deliver(ImportMode::Business, &batch(ImportMode::Business, &["A"], false))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SinkError::rejected(Some(502), "Bulk import failed with HTTP 502")
    );
}

#[tokio::test]
async fn test_slow_response_is_a_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "created": 1 }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let api = client_with(&server, |config| config.timeout_secs = 1);
    let mut slow = batch(ImportMode::Business, &["A"], false);
    slow.index = 4;

    let err = api.deliver(ImportMode::Business, &slow).await.unwrap_err();
    assert_eq!(err, SinkError::Timeout { batch: 4 });
    assert!(err.to_string().contains("batch 4"));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let api = ApiClient::new(&ApiConfig {
        base_url: format!("{}/api", uri),
        token: None,
        timeout_secs: 2,
    })
    .unwrap();
    let err = api
        .deliver(ImportMode::Business, &batch(ImportMode::Business, &["A"], false))
        .await
        .unwrap_err();
    assert!(matches!(err, SinkError::Transport(_)));
}

#[tokio::test]
async fn test_list_categories_follows_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/categories/"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": categories(0..500) })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/categories/"))
        .and(query_param("offset", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(categories(500..503)))
        .expect(1)
        .mount(&server)
        .await;

    let all = client(&server).list_categories().await.unwrap();
    assert_eq!(all.len(), 503);
    assert_eq!(all[502].id, 502);
}

#[tokio::test]
async fn test_list_categories_stops_when_offset_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/categories/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(categories(0..500)))
        .expect(2)
        .mount(&server)
        .await;

    let all = client(&server).list_categories().await.unwrap();
    assert_eq!(all.len(), 500);
}

#[tokio::test]
async fn test_resolve_category() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/categories/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 4, "name": "Personal Injury", "slug": "personal-injury", "full_slug": "lawyers/personal-injury" },
            { "id": 9, "name": "Cardiology", "slug": "cardiology" }
        ])))
        .mount(&server)
        .await;

    let api = client(&server);
    assert_eq!(api.resolve_category("42").await.unwrap(), 42);
    assert_eq!(api.resolve_category("personal-injury").await.unwrap(), 4);
    assert_eq!(api.resolve_category("lawyers/personal-injury").await.unwrap(), 4);
    assert_eq!(api.resolve_category("CARDIOLOGY").await.unwrap(), 9);

    let err = api.resolve_category("plumbing").await.unwrap_err();
    assert!(matches!(err, ImportError::Config(_)));
    assert!(err.to_string().contains("rankify-import categories"));
}

#[tokio::test]
async fn test_pipeline_uploads_through_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/businesses/bulk_create/"))
        .and(query_param("recalc", "0"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "created": 10 })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/businesses/bulk_create/"))
        .and(query_param("recalc", "1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "created": 5 })))
        .expect(1)
        .mount(&server)
        .await;

    let importer = Importer::new(test_config(10), Arc::new(client(&server)));
    let summary = importer
        .run(memory_source(csv_with_rows(25, &[])), ImportMode::Business, 5)
        .await
        .unwrap();

    assert_eq!(summary.uploaded, 25);
    assert_eq!(summary.batches, 3);
}

#[tokio::test]
async fn test_pipeline_stops_on_expired_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let importer = Importer::new(test_config(10), Arc::new(client(&server)));
    let failure = importer
        .run(memory_source(csv_with_rows(25, &[])), ImportMode::Business, 5)
        .await
        .unwrap_err();

    assert!(matches!(
        failure.error,
        ImportError::Upload(SinkError::Unauthorized { status: 401 })
    ));
    assert_eq!(failure.uploaded, 0);
    assert!(failure.to_string().to_lowercase().contains("session"));
}
