//! Interception proxy and catalogue loader against a fake origin that can go
//! down.

use std::sync::Arc;
use std::time::Duration;

use catalogue_core::CatalogueSnapshot;
use catalogue_integration_tests::{
    FakeOrigin, PNG_BYTES, TestServer, client, document, spawn_proxy,
};
use catalogue_offline::config::catalogue_endpoint;
use catalogue_offline::proxy::server::SOURCE_HEADER;
use catalogue_offline::{CatalogueLoader, FileStore, HttpCatalogueSource, SnapshotOrigin};
use serde_json::json;
use url::Url;

// =============================================================================
// Proxy strategies
// =============================================================================

#[tokio::test]
async fn test_images_are_fetched_once() {
    let origin = FakeOrigin::new(json!([]));
    let upstream = TestServer::spawn(origin.router()).await;
    let proxy = spawn_proxy(&upstream.url).await;

    for _ in 0..4 {
        let response = client()
            .get(proxy.server.url("/images/b104.png"))
            .header("sec-fetch-dest", "image")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.bytes().await.unwrap().as_ref(), PNG_BYTES);
    }

    assert_eq!(origin.image_hits(), 1);
}

#[tokio::test]
async fn test_images_survive_origin_outage() {
    let origin = FakeOrigin::new(json!([]));
    let mut upstream = TestServer::spawn(origin.router()).await;
    let proxy = spawn_proxy(&upstream.url).await;

    // No destination header: the extension marks it as an image.
    let first = client()
        .get(proxy.server.url("/images/b104.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(first.headers()[SOURCE_HEADER], "network");

    upstream.stop().await;

    let cached = client()
        .get(proxy.server.url("/images/b104.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(cached.status(), 200);
    assert_eq!(cached.headers()[SOURCE_HEADER], "cache");
    assert_eq!(cached.bytes().await.unwrap().as_ref(), PNG_BYTES);
}

#[tokio::test]
async fn test_api_is_network_first() {
    let origin = FakeOrigin::new(json!([document("a", 1)]));
    let upstream = TestServer::spawn(origin.router()).await;
    let proxy = spawn_proxy(&upstream.url).await;
    let url = proxy.server.url("/api/catalogue");

    let first: CatalogueSnapshot = client()
        .get(url.clone())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first.len(), 1);

    origin
        .set_catalogue(json!([document("a", 1), document("b", 2)]))
        .await;

    let second = client().get(url).send().await.unwrap();
    assert_eq!(second.headers()[SOURCE_HEADER], "network");
    let second: CatalogueSnapshot = second.json().await.unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(origin.catalogue_hits(), 2);
}

#[tokio::test]
async fn test_uncached_request_fails_when_offline() {
    let origin = FakeOrigin::new(json!([]));
    let mut upstream = TestServer::spawn(origin.router()).await;
    let proxy = spawn_proxy(&upstream.url).await;

    upstream.stop().await;

    let response = client().get(proxy.server.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 504);
}

#[tokio::test]
async fn test_error_status_is_passed_through_not_cached() {
    let origin = FakeOrigin::new(json!([document("a", 1)]));
    let mut upstream = TestServer::spawn(origin.router()).await;
    let proxy = spawn_proxy(&upstream.url).await;
    let url = proxy.server.url("/api/catalogue");

    client().get(url.clone()).send().await.unwrap();

    origin
        .set_catalogue_status(Some(axum::http::StatusCode::INTERNAL_SERVER_ERROR))
        .await;
    let failed = client().get(url.clone()).send().await.unwrap();
    assert_eq!(failed.status(), 500);
    assert_eq!(failed.headers()[SOURCE_HEADER], "network");

    // The 500 did not replace the good copy.
    upstream.stop().await;
    let cached = client().get(url).send().await.unwrap();
    assert_eq!(cached.status(), 200);
    assert_eq!(cached.headers()[SOURCE_HEADER], "cache");
}

// =============================================================================
// Loader
// =============================================================================

#[tokio::test]
async fn test_loader_falls_back_to_store_when_origin_is_down() {
    let dir = tempfile::tempdir().unwrap();
    let origin = FakeOrigin::new(json!([document("a", 2), document("b", 1)]));
    let mut upstream = TestServer::spawn(origin.router()).await;

    let loader = loader_with_store(&upstream.url, FileStore::open(dir.path()).await.unwrap());

    let mut online = loader.load().await;
    assert_eq!(online.origin, SnapshotOrigin::Network);
    online.persisted().await.unwrap().unwrap();

    upstream.stop().await;

    // A fresh store instance over the same directory sees the snapshot.
    let store = FileStore::open(dir.path()).await.unwrap();
    let offline = loader_with_store(&upstream.url, store).load().await;
    assert_eq!(offline.origin, SnapshotOrigin::Cache);
    assert_eq!(offline.snapshot, online.snapshot);
}

#[tokio::test]
async fn test_loader_treats_error_status_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    let origin = FakeOrigin::new(json!([document("a", 1)]));
    let upstream = TestServer::spawn(origin.router()).await;
    let loader = loader_with_store(&upstream.url, FileStore::open(dir.path()).await.unwrap());

    loader.load().await.persisted().await.unwrap().unwrap();

    origin
        .set_catalogue_status(Some(axum::http::StatusCode::SERVICE_UNAVAILABLE))
        .await;
    let outcome = loader.load().await;
    assert_eq!(outcome.origin, SnapshotOrigin::Cache);
    assert_eq!(outcome.snapshot.len(), 1);
}

#[tokio::test]
async fn test_loader_with_nothing_anywhere_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let origin = FakeOrigin::new(json!([]));
    let mut upstream = TestServer::spawn(origin.router()).await;
    upstream.stop().await;

    let outcome = loader_with_store(&upstream.url, FileStore::open(dir.path()).await.unwrap())
        .load()
        .await;
    assert_eq!(outcome.origin, SnapshotOrigin::Empty);
    assert!(outcome.snapshot.is_empty());
}

#[tokio::test]
async fn test_loader_malformed_body_is_failure() {
    let dir = tempfile::tempdir().unwrap();
    let origin = FakeOrigin::new(json!({ "not": "a list" }));
    let upstream = TestServer::spawn(origin.router()).await;

    let outcome = loader_with_store(&upstream.url, FileStore::open(dir.path()).await.unwrap())
        .load()
        .await;
    assert_eq!(outcome.origin, SnapshotOrigin::Empty);
}

fn loader_with_store(base: &Url, store: FileStore) -> CatalogueLoader {
    let source =
        HttpCatalogueSource::new(catalogue_endpoint(base).unwrap(), Some(Duration::from_secs(5)))
            .unwrap();
    CatalogueLoader::new(Arc::new(source), Arc::new(store))
}
