//! Integration tests for the catalogue.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p catalogue-integration-tests
//! ```
//!
//! Every test runs real HTTP servers in-process on ephemeral ports and talks
//! to them with `reqwest`. No external services are needed.
//!
//! # Test Categories
//!
//! - `storefront` - storefront routes against a fake content API
//! - `offline` - proxy and loader against a fake origin that can go down
//! - `end_to_end` - content API, storefront, proxy and loader chained together

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use catalogue_offline::proxy::{
    CacheStorage, HttpNetwork, InterceptionProxy, ProxyRegistry, server,
};
use catalogue_offline::{KeyValueStore, MemoryStore};
use catalogue_storefront::config::SanityConfig;
use catalogue_storefront::config::StorefrontConfig;
use catalogue_storefront::state::AppState;
use serde_json::{Value, json};
use tokio::sync::{RwLock, oneshot};
use tokio::task::JoinHandle;
use url::Url;

/// Bytes served for every fake image.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image";

/// Dataset name the fake content API answers for.
pub const DATASET: &str = "production";

// =============================================================================
// TestServer
// =============================================================================

/// An axum server running on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub url: Url,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Bind `127.0.0.1:0` and serve `app` in the background.
    pub async fn spawn(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            url: Url::parse(&format!("http://{addr}")).unwrap(),
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    /// Absolute URL for `path` on this server.
    #[must_use]
    pub fn url(&self, path: &str) -> Url {
        self.url.join(path).unwrap()
    }

    /// Stop accepting connections and wait for the server to exit, so later
    /// requests to it fail to connect.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            // Idle keep-alive connections are closed by graceful shutdown;
            // abort if something holds the server open.
            let abort = handle.abort_handle();
            if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
                abort.abort();
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

// =============================================================================
// Fake content API
// =============================================================================

/// Sanity-style query API serving a fixed document list.
#[derive(Clone, Default)]
pub struct FakeSanity {
    pub documents: Arc<RwLock<Vec<Value>>>,
    pub failing: Arc<AtomicBool>,
    pub hits: Arc<AtomicUsize>,
}

impl FakeSanity {
    #[must_use]
    pub fn new(documents: Vec<Value>) -> Self {
        Self {
            documents: Arc::new(RwLock::new(documents)),
            ..Self::default()
        }
    }

    pub async fn set_documents(&self, documents: Vec<Value>) {
        *self.documents.write().await = documents;
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Router answering `GET /v{version}/data/query/{dataset}`.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/{version}/data/query/{dataset}", get(sanity_query))
            .with_state(self.clone())
    }
}

async fn sanity_query(
    State(fake): State<FakeSanity>,
    Path((_version, dataset)): Path<(String, String)>,
) -> Response {
    fake.hits.fetch_add(1, Ordering::SeqCst);
    if fake.failing.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "content lake unavailable").into_response();
    }
    if dataset != DATASET {
        return (StatusCode::NOT_FOUND, "dataset not found").into_response();
    }

    let mut documents = fake.documents.read().await.clone();
    documents.sort_by_key(|doc| std::cmp::Reverse(doc["modelNumber"].as_i64().unwrap_or(0)));
    Json(json!({ "ms": 1, "query": "catalogue", "result": documents })).into_response()
}

/// A catalogue document as the content API projects it.
#[must_use]
pub fn document(id: &str, model_number: i64) -> Value {
    json!({
        "_id": id,
        "modelNumber": model_number,
        "image": {
            "_type": "image",
            "asset": { "_ref": format!("image-{id}-800x800-jpg"), "_type": "reference" }
        },
        "sizes": ["Adult"],
        "weightAdult": 12.5,
        "weightKids": 6
    })
}

/// Storefront configured against a fake content API, with result caching off.
pub async fn spawn_storefront(sanity: &TestServer) -> TestServer {
    spawn_storefront_with_snapshots(sanity, Arc::new(MemoryStore::new())).await
}

/// Storefront keeping its last good catalogue in `snapshots`.
pub async fn spawn_storefront_with_snapshots(
    sanity: &TestServer,
    snapshots: Arc<dyn KeyValueStore>,
) -> TestServer {
    let mut sanity_config = SanityConfig::new("testproject");
    sanity_config.api_host = Some(sanity.url.clone());
    sanity_config.cache_ttl = None;

    let config = StorefrontConfig {
        host: [127, 0, 0, 1].into(),
        port: 0,
        sanity: sanity_config,
        snapshot_dir: std::path::PathBuf::from(".catalogue-storefront"),
        sentry_dsn: None,
        sentry_environment: None,
    };
    let state = AppState::new(config, snapshots).unwrap();
    TestServer::spawn(catalogue_storefront::app(state)).await
}

// =============================================================================
// Fake origin
// =============================================================================

/// Minimal site origin: a catalogue endpoint, images and a page.
#[derive(Clone, Default)]
pub struct FakeOrigin {
    pub catalogue: Arc<RwLock<Value>>,
    pub catalogue_hits: Arc<AtomicUsize>,
    pub image_hits: Arc<AtomicUsize>,
    pub catalogue_status: Arc<RwLock<Option<StatusCode>>>,
}

impl FakeOrigin {
    #[must_use]
    pub fn new(catalogue: Value) -> Self {
        Self {
            catalogue: Arc::new(RwLock::new(catalogue)),
            ..Self::default()
        }
    }

    pub async fn set_catalogue(&self, catalogue: Value) {
        *self.catalogue.write().await = catalogue;
    }

    /// Answer `/api/catalogue` with `status` and a plain-text body instead.
    pub async fn set_catalogue_status(&self, status: Option<StatusCode>) {
        *self.catalogue_status.write().await = status;
    }

    #[must_use]
    pub fn image_hits(&self) -> usize {
        self.image_hits.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn catalogue_hits(&self) -> usize {
        self.catalogue_hits.load(Ordering::SeqCst)
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(|| async { "<html><body>catalogue</body></html>" }))
            .route("/api/catalogue", get(origin_catalogue))
            .route("/images/{name}", get(origin_image))
            .with_state(self.clone())
    }
}

async fn origin_catalogue(State(origin): State<FakeOrigin>) -> Response {
    origin.catalogue_hits.fetch_add(1, Ordering::SeqCst);
    if let Some(status) = *origin.catalogue_status.read().await {
        return (status, "not json").into_response();
    }
    Json(origin.catalogue.read().await.clone()).into_response()
}

async fn origin_image(State(origin): State<FakeOrigin>, Path(_name): Path<String>) -> Response {
    origin.image_hits.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES).into_response()
}

// =============================================================================
// Proxy
// =============================================================================

/// An active interception proxy for `upstream`, served on its own port.
pub struct TestProxy {
    pub server: TestServer,
    pub registry: ProxyRegistry,
    pub proxy: Arc<InterceptionProxy>,
}

/// Register, activate and serve a proxy forwarding to `upstream`.
pub async fn spawn_proxy(upstream: &Url) -> TestProxy {
    let network = Arc::new(HttpNetwork::new(Some(Duration::from_secs(5))).unwrap());
    let registry = ProxyRegistry::new();
    let registration = registry
        .register("/", || {
            InterceptionProxy::new("/", "catalogue-v1", CacheStorage::new(), network)
        })
        .await;
    let proxy = registration.proxy;
    proxy.activate().await.unwrap();

    let server = TestServer::spawn(server::router(Arc::clone(&proxy), upstream.clone())).await;
    TestProxy {
        server,
        registry,
        proxy,
    }
}

/// HTTP client that never reuses connections, so a stopped server is seen as
/// down immediately.
#[must_use]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
