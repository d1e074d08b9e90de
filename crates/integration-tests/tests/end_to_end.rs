//! Content API, storefront, proxy and loader chained together.
//!
//! ```text
//! loader -> proxy -> storefront -> fake content API
//!   \-> file store
//! ```

use std::sync::Arc;
use std::time::Duration;

use catalogue_core::{SNAPSHOT_KEY, SizeTag};
use catalogue_integration_tests::{
    FakeSanity, TestServer, client, document, spawn_proxy, spawn_storefront,
    spawn_storefront_with_snapshots,
};
use catalogue_offline::config::catalogue_endpoint;
use catalogue_offline::proxy::server::SOURCE_HEADER;
use catalogue_offline::{
    CatalogueLoader, FileStore, HttpCatalogueSource, KeyValueStore, MemoryStore, SnapshotOrigin,
};
use url::Url;

async fn loader(base: &Url, dir: &std::path::Path) -> CatalogueLoader {
    let source =
        HttpCatalogueSource::new(catalogue_endpoint(base).unwrap(), Some(Duration::from_secs(5)))
            .unwrap();
    let store = FileStore::open(dir).await.unwrap();
    CatalogueLoader::new(Arc::new(source), Arc::new(store))
}

#[tokio::test]
async fn test_catalogue_stays_available_as_services_go_down() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeSanity::new(vec![document("a", 101), document("b", 102)]);
    let sanity = TestServer::spawn(fake.router()).await;
    let mut storefront = spawn_storefront(&sanity).await;
    let mut proxy = spawn_proxy(&storefront.url).await;

    // Online: fresh data through the proxy, persisted for later.
    let mut online = loader(&proxy.server.url, dir.path()).await.load().await;
    assert_eq!(online.origin, SnapshotOrigin::Network);
    assert_eq!(online.snapshot.len(), 2);
    assert_eq!(online.snapshot.items()[0].title(), "B102");
    online.persisted().await.unwrap().unwrap();

    // Warm the page while the storefront is up.
    let page = client().get(proxy.server.url("/")).send().await.unwrap();
    assert_eq!(page.status(), 200);

    // Storefront down: the proxy answers from its response cache.
    storefront.stop().await;

    let via_cache = loader(&proxy.server.url, dir.path()).await.load().await;
    assert_eq!(via_cache.origin, SnapshotOrigin::Network);
    assert_eq!(via_cache.snapshot, online.snapshot);

    let page = client().get(proxy.server.url("/")).send().await.unwrap();
    assert_eq!(page.status(), 200);
    assert_eq!(page.headers()[SOURCE_HEADER], "cache");
    assert!(page.text().await.unwrap().contains("B101"));

    // Proxy down as well: the loader reads the persisted snapshot.
    proxy.server.stop().await;

    let from_store = loader(&proxy.server.url, dir.path()).await.load().await;
    assert_eq!(from_store.origin, SnapshotOrigin::Cache);
    assert_eq!(from_store.snapshot, online.snapshot);

    // Untagged kids weight survived every hop but is still not displayable.
    let item = &from_store.snapshot.items()[1];
    assert_eq!(item.weight_kids, Some(6.0));
    assert_eq!(item.visible_weight(SizeTag::Kids), None);
    assert_eq!(item.visible_weight(SizeTag::Adult), Some(12.5));
}

#[tokio::test]
async fn test_new_content_replaces_offline_copy() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeSanity::new(vec![document("a", 101)]);
    let sanity = TestServer::spawn(fake.router()).await;
    let mut storefront = spawn_storefront(&sanity).await;

    let mut first = loader(&storefront.url, dir.path()).await.load().await;
    first.persisted().await.unwrap().unwrap();

    fake.set_documents(Vec::new()).await;
    let mut second = loader(&storefront.url, dir.path()).await.load().await;
    assert_eq!(second.origin, SnapshotOrigin::Network);
    assert!(second.snapshot.is_empty());
    second.persisted().await.unwrap().unwrap();

    storefront.stop().await;

    let offline = loader(&storefront.url, dir.path()).await.load().await;
    assert_eq!(offline.origin, SnapshotOrigin::Cache);
    assert!(offline.snapshot.is_empty());
}

#[tokio::test]
async fn test_page_degrades_when_only_content_api_is_down() {
    let fake = FakeSanity::new(vec![document("a", 101)]);
    let sanity = TestServer::spawn(fake.router()).await;
    let snapshots = Arc::new(MemoryStore::new());
    let storefront = spawn_storefront_with_snapshots(&sanity, snapshots.clone()).await;
    let proxy = spawn_proxy(&storefront.url).await;

    let warm = client().get(proxy.server.url("/")).send().await.unwrap();
    assert_eq!(warm.status(), 200);
    for _ in 0..100 {
        if snapshots.get(SNAPSHOT_KEY).await.unwrap().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    fake.fail(true);
    let page = client().get(proxy.server.url("/")).send().await.unwrap();
    assert_eq!(page.status(), 200);
    assert_eq!(page.headers()[SOURCE_HEADER], "network");

    let html = page.text().await.unwrap();
    assert!(html.contains("B101"));
    assert!(html.contains("Showing the last saved copy"));
}
