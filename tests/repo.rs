//! Integration tests for the repository content API and the destination
//! configuration API against a mock server.

use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use apprepo::destination::{Destination, DestinationClient, Level};
use apprepo::errors::RepoError;
use apprepo::repo::RepoClient;

use serde_json::json;

fn repo_for(server: &MockServer) -> RepoClient {
    RepoClient::new(reqwest::Client::new(), server.uri(), "repo-token")
}

#[tokio::test]
async fn applications_listing_carries_token_and_scope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/applications/metadata/"))
        .and(header("authorization", "Bearer repo-token"))
        .and(header("x-app-host-id", "host-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "applicationName": "shop",
                "applicationVersion": "1.0.0",
                "changedOn": "2026-08-01T10:00:00Z",
                "isDefault": true
            },
            { "applicationName": "admin", "applicationVersion": "2.1.0" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let apps = repo_for(&server)
        .list_applications(Some("host-1"))
        .await
        .unwrap();
    assert_eq!(apps.len(), 2);
    assert_eq!(apps[0].app_key(), "shop-1.0.0");
    assert!(apps[0].is_default);
    assert!(!apps[1].is_default);
}

#[tokio::test]
async fn file_listing_addresses_the_app_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/applications/files/path/shop-1.0.0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(["/shop-1.0.0/index.html", "/shop-1.0.0/app.js"])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let files = repo_for(&server)
        .list_files("shop-1.0.0", None)
        .await
        .unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0], "/shop-1.0.0/index.html");
}

#[tokio::test]
async fn upload_sends_one_multipart_part_per_archive() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("ui.zip");
    let second = dir.path().join("admin.zip");
    std::fs::write(&first, b"PK\x03\x04ui").unwrap();
    std::fs::write(&second, b"PK\x03\x04admin").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/applications/content/"))
        .and(header("authorization", "Bearer repo-token"))
        .and(body_string_contains("name=\"apps\""))
        .and(body_string_contains("ui.zip"))
        .and(body_string_contains("admin.zip"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    repo_for(&server)
        .upload(&[first, second], None)
        .await
        .unwrap();
}

#[tokio::test]
async fn upload_of_missing_archive_is_a_read_error() {
    let server = MockServer::start().await;
    let err = repo_for(&server)
        .upload(&[std::path::PathBuf::from("/nonexistent/app.zip")], None)
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::ArchiveRead { .. }));
}

#[tokio::test]
async fn content_delete_is_scoped_to_the_app_host() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/applications/content/"))
        .and(header("x-app-host-id", "host-9"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    repo_for(&server).delete_content("host-9").await.unwrap();
}

#[tokio::test]
async fn failed_repository_call_surfaces_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/app-host/metadata"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = repo_for(&server).service_meta(None).await.unwrap_err();
    match err {
        RepoError::Api { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "forbidden");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn destinations_round_trip_with_extra_properties() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/destination-configuration/v1/subaccountDestinations"))
        .and(body_string_contains("forwardAuthToken"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/destination-configuration/v1/subaccountDestinations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "Name": "backend",
                "Type": "HTTP",
                "URL": "https://api.example.com",
                "Authentication": "NoAuthentication",
                "ProxyType": "Internet",
                "forwardAuthToken": "true"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/destination-configuration/v1/subaccountDestinations/backend"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = DestinationClient::new(reqwest::Client::new(), server.uri(), "dest-token");

    let destination = Destination {
        name: "backend".to_string(),
        destination_type: Some("HTTP".to_string()),
        url: Some("https://api.example.com".to_string()),
        authentication: Some("NoAuthentication".to_string()),
        proxy_type: Some("Internet".to_string()),
        extra: [("forwardAuthToken".to_string(), "true".to_string())]
            .into_iter()
            .collect(),
    };
    client.create(Level::Subaccount, &destination).await.unwrap();

    let listed = client.list(Level::Subaccount).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "backend");
    assert_eq!(
        listed[0].extra.get("forwardAuthToken").map(String::as_str),
        Some("true")
    );

    client.delete(Level::Subaccount, "backend").await.unwrap();
}

#[tokio::test]
async fn missing_instance_destination_reads_as_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/destination-configuration/v1/instanceDestinations/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = DestinationClient::new(reqwest::Client::new(), server.uri(), "dest-token");
    let found = client.get(Level::Instance, "ghost").await.unwrap();
    assert!(found.is_none());
}
