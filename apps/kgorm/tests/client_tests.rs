//! HTTP tests for the kg-core client against a mock server.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use kgorm::{ClientError, KgApi, KgClient, QueryParams};
use kgorm_core::{ReleaseStatus, Stage};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UUID: &str = "9d2c9f3e-4a4d-4b9e-8a0b-2f0c7b1e6a11";
const URI: &str = "https://kg.ebrains.eu/api/instances/9d2c9f3e-4a4d-4b9e-8a0b-2f0c7b1e6a11";

/// Start a mock server and create a client pointing to it.
async fn setup_test_client() -> (MockServer, KgClient) {
    let mock_server = MockServer::start().await;
    let client = KgClient::new(
        &mock_server.uri(),
        Some("test-token".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();
    (mock_server, client)
}

fn uuid() -> Uuid {
    Uuid::parse_str(UUID).unwrap()
}

// =============================================================================
// QUERIES
// =============================================================================

#[tokio::test]
async fn test_query_sends_parameters_and_token() {
    let (mock_server, client) = setup_test_client().await;
    let query = json!({"meta": {"type": "https://openminds.ebrains.eu/core/Person"}});

    Mock::given(method("POST"))
        .and(path("/queries"))
        .and(header("authorization", "Bearer test-token"))
        .and(query_param("stage", "IN_PROGRESS"))
        .and(query_param("from", "10"))
        .and(query_param("size", "5"))
        .and(query_param("returnTotalResults", "true"))
        .and(query_param("given_name", "Ada"))
        .and(body_json(&query))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"@id": URI}],
            "total": 11,
            "from": 10,
            "size": 5
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut filters = BTreeMap::new();
    filters.insert("given_name".to_string(), "Ada".to_string());
    let params = QueryParams {
        stage: Stage::InProgress,
        from: 10,
        size: 5,
        instance_id: None,
        filters,
    };
    let page = client.query(&query, &params).await.unwrap();

    assert_eq!(page.data.len(), 1);
    assert_eq!(page.total, Some(11));
    assert_eq!(page.from, 10);
}

#[tokio::test]
async fn test_query_restricted_to_instance() {
    let (mock_server, client) = setup_test_client().await;

    Mock::given(method("POST"))
        .and(path("/queries"))
        .and(query_param("instanceId", UUID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let params = QueryParams {
        instance_id: Some(uuid()),
        ..QueryParams::default()
    };
    let page = client.query(&json!({}), &params).await.unwrap();
    assert!(page.data.is_empty());
    assert_eq!(page.total, None);
}

// =============================================================================
// INSTANCES
// =============================================================================

#[tokio::test]
async fn test_instance_found() {
    let (mock_server, client) = setup_test_client().await;

    Mock::given(method("GET"))
        .and(path(format!("/instances/{UUID}")))
        .and(query_param("stage", "RELEASED"))
        .and(query_param("returnEmbedded", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"@id": URI, "@type": ["https://openminds.ebrains.eu/core/Person"]}
        })))
        .mount(&mock_server)
        .await;

    let doc = client
        .instance_from_full_uri(URI, Stage::Released)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc["@id"], json!(URI));
}

#[tokio::test]
async fn test_instance_not_found_is_none() {
    let (mock_server, client) = setup_test_client().await;

    Mock::given(method("GET"))
        .and(path(format!("/instances/{UUID}")))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such instance"))
        .mount(&mock_server)
        .await;

    let result = client.instance_from_full_uri(URI, Stage::InProgress).await;
    assert_eq!(result, Ok(None));
}

#[tokio::test]
async fn test_instance_requires_valid_uri() {
    let (_mock_server, client) = setup_test_client().await;
    let result = client.instance_from_full_uri("not-an-id", Stage::Released).await;
    assert!(matches!(result, Err(ClientError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_create_posts_into_space() {
    let (mock_server, client) = setup_test_client().await;
    let body = json!({"@type": ["https://openminds.ebrains.eu/core/Person"]});

    Mock::given(method("POST"))
        .and(path(format!("/instances/{UUID}")))
        .and(query_param("space", "common"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"@id": URI}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let created = client.create_new_instance(&body, "common", uuid()).await.unwrap();
    assert_eq!(created["@id"], json!(URI));
}

#[tokio::test]
async fn test_update_patches_instance() {
    let (mock_server, client) = setup_test_client().await;
    let changes = json!({"https://openminds.ebrains.eu/vocab/givenName": "Augusta"});

    Mock::given(method("PATCH"))
        .and(path(format!("/instances/{UUID}")))
        .and(body_json(&changes))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"@id": URI}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    client.update_instance(uuid(), &changes).await.unwrap();
}

#[tokio::test]
async fn test_delete_accepts_empty_body() {
    let (mock_server, client) = setup_test_client().await;

    Mock::given(method("DELETE"))
        .and(path(format!("/instances/{UUID}")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    client.delete_instance(uuid()).await.unwrap();
}

// =============================================================================
// RELEASE
// =============================================================================

#[tokio::test]
async fn test_release_and_unrelease() {
    let (mock_server, client) = setup_test_client().await;
    let release_path = format!("/instances/{UUID}/release");

    Mock::given(method("PUT"))
        .and(path(release_path.clone()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(release_path))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    client.release(uuid()).await.unwrap();
    client.unrelease(uuid()).await.unwrap();
}

#[tokio::test]
async fn test_release_status_parsed() {
    let (mock_server, client) = setup_test_client().await;

    Mock::given(method("GET"))
        .and(path(format!("/instances/{UUID}/release/status")))
        .and(query_param("releaseTreeScope", "TOP_INSTANCE_ONLY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "HAS_CHANGED"})))
        .mount(&mock_server)
        .await;

    let status = client.release_status(uuid()).await.unwrap();
    assert_eq!(status, ReleaseStatus::HasChanged);
}

// =============================================================================
// ACCOUNT
// =============================================================================

#[tokio::test]
async fn test_spaces_lists_identifiers() {
    let (mock_server, client) = setup_test_client().await;

    Mock::given(method("GET"))
        .and(path("/spaces"))
        .and(query_param("permissions", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"http://schema.org/identifier": "common"},
                {"http://schema.org/identifier": "dataset"}
            ],
            "total": 2
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let spaces = client.spaces().await.unwrap();
    assert_eq!(spaces, vec!["common".to_string(), "dataset".to_string()]);
}

#[tokio::test]
async fn test_user_info_unwraps_data() {
    let (mock_server, client) = setup_test_client().await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"http://schema.org/alternateName": "alovelace"}
        })))
        .mount(&mock_server)
        .await;

    let user = client.user_info().await.unwrap();
    assert_eq!(user["http://schema.org/alternateName"], json!("alovelace"));
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    let (mock_server, client) = setup_test_client().await;

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/spaces"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/instances/{UUID}/release")))
        .respond_with(ResponseTemplate::new(403).set_body_string("no release rights"))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("/instances/{UUID}")))
        .respond_with(ResponseTemplate::new(409).set_body_string("conflict"))
        .mount(&mock_server)
        .await;

    assert_eq!(client.user_info().await, Err(ClientError::Unauthorized));
    assert_eq!(
        client.spaces().await,
        Err(ClientError::ServerError(503, "maintenance".to_string()))
    );
    assert_eq!(
        client.release(uuid()).await,
        Err(ClientError::Forbidden("no release rights".to_string()))
    );
    assert_eq!(
        client.update_instance(uuid(), &json!({})).await,
        Err(ClientError::BadRequest(409, "conflict".to_string()))
    );
}

#[tokio::test]
async fn test_connection_failure() {
    let client = KgClient::new("http://127.0.0.1:9", None, Duration::from_secs(2)).unwrap();
    let result = client.user_info().await;
    assert!(matches!(result, Err(ClientError::ConnectionFailed(_))));
}
