//! Storefront routes against a fake content API.

use std::sync::Arc;
use std::time::Duration;

use catalogue_core::{CatalogueSnapshot, SNAPSHOT_KEY};
use catalogue_integration_tests::{
    FakeSanity, TestServer, client, document, spawn_storefront, spawn_storefront_with_snapshots,
};
use catalogue_offline::{FileStore, KeyValueStore, MemoryStore};
use serde_json::Value;

async fn setup(documents: Vec<Value>) -> (FakeSanity, TestServer, TestServer) {
    let fake = FakeSanity::new(documents);
    let sanity = TestServer::spawn(fake.router()).await;
    let storefront = spawn_storefront(&sanity).await;
    (fake, sanity, storefront)
}

// =============================================================================
// /api/catalogue
// =============================================================================

#[tokio::test]
async fn test_api_catalogue_passes_through_newest_first() {
    let (fake, _sanity, storefront) =
        setup(vec![document("a", 101), document("b", 104), document("c", 102)]).await;

    let response = client()
        .get(storefront.url("/api/catalogue"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let snapshot: CatalogueSnapshot = response.json().await.unwrap();
    let titles: Vec<String> = snapshot.items().iter().map(|item| item.title()).collect();
    assert_eq!(titles, ["B104", "B102", "B101"]);
    assert_eq!(fake.hits(), 1);
}

#[tokio::test]
async fn test_api_catalogue_keeps_untagged_weights_on_the_wire() {
    let (_fake, _sanity, storefront) = setup(vec![document("a", 101)]).await;

    let body: Value = client()
        .get(storefront.url("/api/catalogue"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body[0]["_id"], "a");
    assert_eq!(body[0]["weightKids"], 6.0);
    assert_eq!(body[0]["sizes"], serde_json::json!(["Adult"]));
}

#[tokio::test]
async fn test_api_catalogue_content_failure_is_bad_gateway() {
    let (fake, _sanity, storefront) = setup(vec![document("a", 1)]).await;
    fake.fail(true);

    let response = client()
        .get(storefront.url("/api/catalogue"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    assert_eq!(response.text().await.unwrap(), "External service error");
}

#[tokio::test]
async fn test_api_catalogue_empty_list() {
    let (_fake, _sanity, storefront) = setup(Vec::new()).await;

    let response = client()
        .get(storefront.url("/api/catalogue"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "[]");
}

// =============================================================================
// Pages
// =============================================================================

#[tokio::test]
async fn test_grid_page_renders_items() {
    let (_fake, _sanity, storefront) =
        setup((1..=5).map(|n| document(&format!("d{n}"), 100 + n)).collect()).await;

    let response = client().get(storefront.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("x-request-id"));

    let html = response.text().await.unwrap();
    assert!(html.contains("B105"));
    assert!(html.contains("B101"));
    assert!(html.contains("Page 2"));
    assert!(html.contains("12.5g"));
    assert!(!html.contains("K-6g"));
    assert!(html.contains("cdn.sanity.io/images/testproject/production/d1-800x800.jpg"));
}

#[tokio::test]
async fn test_grid_single_page() {
    let (_fake, _sanity, storefront) =
        setup((1..=5).map(|n| document(&format!("d{n}"), 100 + n)).collect()).await;

    let html = client()
        .get(storefront.url("/?page=2"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("B101"));
    assert!(!html.contains("B105"));
    assert!(html.contains("/?page=1"));

    let missing = client().get(storefront.url("/?page=3")).send().await.unwrap();
    assert_eq!(missing.status(), 404);

    let zero = client().get(storefront.url("/?page=0")).send().await.unwrap();
    assert_eq!(zero.status(), 400);
}

/// Wait for the storefront's background write of the catalogue snapshot.
async fn wait_for_snapshot(store: &dyn KeyValueStore) {
    for _ in 0..100 {
        if store.get(SNAPSHOT_KEY).await.unwrap().is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("catalogue snapshot was never persisted");
}

#[tokio::test]
async fn test_grid_shows_last_catalogue_while_content_api_is_down() {
    let fake = FakeSanity::new(vec![document("a", 101), document("b", 102)]);
    let sanity = TestServer::spawn(fake.router()).await;
    let snapshots = Arc::new(MemoryStore::new());
    let storefront = spawn_storefront_with_snapshots(&sanity, snapshots.clone()).await;

    let fresh = client().get(storefront.url("/")).send().await.unwrap();
    assert_eq!(fresh.status(), 200);
    assert!(!fresh.text().await.unwrap().contains("temporarily unavailable"));
    wait_for_snapshot(&*snapshots).await;

    fake.fail(true);
    let response = client().get(storefront.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let html = response.text().await.unwrap();
    assert!(html.contains("Showing the last saved copy"));
    assert!(html.contains("B102"));
    assert!(html.contains("B101"));
}

#[tokio::test]
async fn test_grid_without_saved_catalogue_renders_empty_while_down() {
    let (fake, _sanity, storefront) = setup(vec![document("a", 1)]).await;
    fake.fail(true);

    let response = client().get(storefront.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let html = response.text().await.unwrap();
    assert!(html.contains("The catalogue is temporarily unavailable."));
    assert!(html.contains("No catalogue items yet."));
}

#[tokio::test]
async fn test_saved_catalogue_survives_storefront_restart() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeSanity::new(vec![document("a", 104)]);
    let sanity = TestServer::spawn(fake.router()).await;

    let first_store = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let mut first = spawn_storefront_with_snapshots(&sanity, first_store.clone()).await;
    client().get(first.url("/")).send().await.unwrap();
    wait_for_snapshot(&*first_store).await;
    first.stop().await;

    fake.fail(true);
    let second_store = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let second = spawn_storefront_with_snapshots(&sanity, second_store).await;

    let html = client()
        .get(second.url("/"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains("B104"));
    assert!(html.contains("Showing the last saved copy"));
}

#[tokio::test]
async fn test_health_and_manifest() {
    let (_fake, _sanity, storefront) = setup(Vec::new()).await;

    let health = client().get(storefront.url("/health")).send().await.unwrap();
    assert_eq!(health.text().await.unwrap(), "ok");

    let manifest: Value = client()
        .get(storefront.url("/manifest.json"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(manifest["theme_color"], "#0b1a3d");
}

#[tokio::test]
async fn test_static_stylesheet() {
    let (_fake, _sanity, storefront) = setup(Vec::new()).await;

    let response = client()
        .get(storefront.url("/static/css/main.css"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}
