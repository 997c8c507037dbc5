use std::io::Read;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use docstore_gateway::{
    ApiClient, EntityKind, EntityQuery, Error, GatewayConfig, ListOptions, StorageGateway,
};

const FOLDER_ID: &str = "2e608db7-cf2e-4e5b-b4c0-4dd4063d0cab";
const FILE_ID: &str = "e2c25c1b-f6a9-4cf6-b8d2-271e628a9a56";

fn client(uri: &str) -> ApiClient {
    let config = GatewayConfig::new(&format!("{}/api/v1", uri), "token123").unwrap();
    ApiClient::from_config(config).unwrap()
}

fn record(kind: &str, uuid: &str, name: &str) -> serde_json::Value {
    json!({
        "entity_type": kind,
        "uuid": uuid,
        "name": name,
        "description": "",
        "created_by": "303447",
        "modified_by": "303447",
        "parent": FOLDER_ID
    })
}

#[tokio::test]
async fn test_get_entity_details() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/entity/{}/", FOLDER_ID)))
        .and(header("Authorization", "Bearer token123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(record("folder", FOLDER_ID, "Foo")))
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || client(&uri).get_entity_details(FOLDER_ID))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result.name, "Foo");
    assert_eq!(result.entity_type, EntityKind::Folder);
}

#[tokio::test]
async fn test_not_found_maps_to_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/entity/"))
        .and(query_param("path", "/nope"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || {
        client(&uri).get_entity_by_query(&EntityQuery::Path("/nope".to_string()))
    })
    .await
    .unwrap();

    assert!(result.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_list_folder_content_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/folder/{}/children/", FOLDER_ID)))
        .and(query_param("page", "2"))
        .and(query_param("ordering", "name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 3,
            "next": null,
            "previous": "page=1",
            "results": [record("file", FILE_ID, "c.txt")]
        })))
        .mount(&server)
        .await;

    let uri = server.uri();
    let page = tokio::task::spawn_blocking(move || {
        client(&uri).list_folder_content(FOLDER_ID, &ListOptions::page_by_name(2))
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(page.count, 3);
    assert!(!page.has_next());
    assert_eq!(page.results[0].name, "c.txt");
}

#[tokio::test]
async fn test_create_folder() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/folder/"))
        .and(body_json(json!({"name": "data", "parent": FOLDER_ID})))
        .respond_with(ResponseTemplate::new(201).set_body_json(record("folder", FILE_ID, "data")))
        .mount(&server)
        .await;

    let uri = server.uri();
    let created = tokio::task::spawn_blocking(move || client(&uri).create_folder("data", FOLDER_ID))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(created.uuid, FILE_ID);
}

#[tokio::test]
async fn test_forbidden_create_file() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/file/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || {
        client(&uri).create_file("a.txt", "text/plain", FOLDER_ID)
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(Error::Forbidden { .. })));
}

#[tokio::test]
async fn test_upload_file_content_returns_etag() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(format!("/api/v1/file/{}/content/upload/", FILE_ID)))
        .respond_with(ResponseTemplate::new(201).insert_header("ETag", "\"abc123\""))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("a.txt");
    std::fs::write(&source, b"hello").unwrap();

    let uri = server.uri();
    let etag = tokio::task::spawn_blocking(move || {
        client(&uri).upload_file_content(FILE_ID, &source, None)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(etag, "\"abc123\"");
}

#[tokio::test]
async fn test_signed_url_download_streams_content() {
    let server = MockServer::start().await;
    let signed = format!("{}/signed/xyz", server.uri());

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/file/{}/content/secure_link/", FILE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"signed_url": signed})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/signed/xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
        .mount(&server)
        .await;

    let uri = server.uri();
    let content = tokio::task::spawn_blocking(move || {
        let client = client(&uri);
        let url = client.get_signed_url(FILE_ID).unwrap();
        let mut reader = client.download_signed_url(&url).unwrap();
        let mut content = Vec::new();
        reader.read_to_end(&mut content).unwrap();
        content
    })
    .await
    .unwrap();

    assert_eq!(content.len(), 4096);
}

#[tokio::test]
async fn test_delete_folder() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(format!("/api/v1/folder/{}/", FOLDER_ID)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || client(&uri).delete_folder(FOLDER_ID))
        .await
        .unwrap();

    assert!(result.is_ok());
}
