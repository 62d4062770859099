//! Integration tests for the Device42 client using wiremock.

use cmdbsync_core::{Device42Settings, ResourceDescriptor, SourceMethod};
use cmdbsync_device42::{Device42Client, Device42Error};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{basic_auth, body_string_contains, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Test Helpers
// =============================================================================

fn create_client(server: &MockServer) -> Device42Client {
    let settings = Device42Settings {
        url: server.uri(),
        user: "admin".to_string(),
        password: "secret".to_string(),
    };
    Device42Client::new(&settings, Duration::from_secs(5)).unwrap()
}

fn resource(path: &str, method: SourceMethod, doql: Option<&str>) -> ResourceDescriptor {
    ResourceDescriptor {
        path: path.to_string(),
        method,
        model: Some("Devices".to_string()),
        doql: doql.map(str::to_string),
        extra_filter: None,
    }
}

// =============================================================================
// Paginated Reads
// =============================================================================

#[tokio::test]
async fn test_request_reads_all_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1.0/devices/all/"))
        .and(query_param_is_missing("offset"))
        .and(basic_auth("admin", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Devices": [{"name": "a"}, {"name": "b"}],
            "limit": 2,
            "offset": 0,
            "total_count": 5
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/1.0/devices/all/"))
        .and(query_param("offset", "2"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Devices": [{"name": "c"}, {"name": "d"}],
            "limit": 2,
            "offset": 2,
            "total_count": 5
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/1.0/devices/all/"))
        .and(query_param("offset", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Devices": [{"name": "e"}],
            "limit": 2,
            "offset": 4,
            "total_count": 5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let records = client.request("api/1.0/devices/all/", "Devices").await.unwrap();

    let names: Vec<_> = records.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
}

#[tokio::test]
async fn test_request_without_limit_reads_one_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1.0/software/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "software": [{"name": "nginx"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let records = client.request("api/1.0/software/", "software").await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_request_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1.0/devices/all/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("denied"))
        .mount(&server)
        .await;

    let client = create_client(&server);
    let err = client.request("api/1.0/devices/all/", "Devices").await.unwrap_err();
    assert!(matches!(err, Device42Error::Status { status: 401, .. }), "got {err:?}");
    assert_eq!(err.status(), Some(401));
}

// =============================================================================
// DOQL
// =============================================================================

#[tokio::test]
async fn test_fetch_prefers_doql() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/services/data/v1.0/query/"))
        .and(body_string_contains("output_type=json"))
        .and(body_string_contains("query=select+name+from+view_device_v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "srv-1"},
            {"name": "srv-2"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let records = client
        .fetch(&resource(
            "services/data/v1.0/query",
            SourceMethod::Post,
            Some("select name from view_device_v1"),
        ))
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["name"], "srv-1");
}

#[tokio::test]
async fn test_doql_default_query() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/services/data/v1.0/query/"))
        .and(body_string_contains("view_device_v1+order+by+device_pk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_client(&server);
    let records = client.doql("services/data/v1.0/query/", None).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_doql_rejects_non_list() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/services/data/v1.0/query/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "bad query"})))
        .mount(&server)
        .await;

    let client = create_client(&server);
    let err = client.doql("services/data/v1.0/query/", Some("nonsense")).await.unwrap_err();
    assert!(matches!(err, Device42Error::Parse { .. }));
}

#[tokio::test]
async fn test_fetch_post_without_query_is_empty() {
    let server = MockServer::start().await;

    let client = create_client(&server);
    let records = client
        .fetch(&resource("services/data/v1.0/query/", SourceMethod::Post, Some("  ")))
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_fetch_applies_extra_filter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1.0/devices/all/"))
        .and(query_param("type", "virtual"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Devices": [{"name": "vm-1"}],
            "limit": 1,
            "total_count": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut descriptor = resource("api/1.0/devices/all/", SourceMethod::Get, None);
    descriptor.extra_filter = Some("type=virtual".to_string());

    let client = create_client(&server);
    let records = client.fetch(&descriptor).await.unwrap();
    assert_eq!(records.len(), 1);
}
