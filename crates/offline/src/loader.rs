//! Network-first catalogue loading with a persisted fallback.
//!
//! [`CatalogueLoader::load`] is a one-shot operation:
//!
//! 1. Fetch the catalogue from the network.
//! 2. On success, persist the snapshot under `"items"` in the background and
//!    present the fresh list. An empty list is a valid snapshot.
//! 3. On any failure (transport, non-2xx status, malformed body), present the
//!    persisted snapshot, or an empty list if there is none or the store
//!    cannot be read.
//!
//! Nothing is kept in memory between calls.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use catalogue_core::{CatalogueSnapshot, SNAPSHOT_KEY};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::store::{self, KeyValueStore, StoreError};

/// Errors that make a catalogue fetch count as failed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Body was not a catalogue item list.
    #[error("Malformed catalogue payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// Source could not be reached for another reason.
    #[error("Catalogue unavailable: {0}")]
    Unavailable(String),
}

/// Where a catalogue list comes from over the network.
#[async_trait]
pub trait CatalogueSource: Send + Sync {
    async fn fetch(&self) -> Result<CatalogueSnapshot, FetchError>;
}

/// Fetches `GET /api/catalogue` with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpCatalogueSource {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpCatalogueSource {
    /// Create a source for the given endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(endpoint: Url, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            endpoint,
        })
    }

    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl CatalogueSource for HttpCatalogueSource {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch(&self) -> Result<CatalogueSnapshot, FetchError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;
        match serde_json::from_str::<CatalogueSnapshot>(&body) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                debug!(
                    error = %e,
                    body = %body.chars().take(200).collect::<String>(),
                    "Catalogue payload did not parse"
                );
                Err(FetchError::Parse(e))
            }
        }
    }
}

/// Where the presented list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// Freshly fetched.
    Network,
    /// Fetch failed; last persisted snapshot.
    Cache,
    /// Fetch failed and nothing usable was persisted.
    Empty,
}

impl std::fmt::Display for SnapshotOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Network => "network",
            Self::Cache => "offline copy",
            Self::Empty => "nothing available",
        })
    }
}

/// Result of one [`CatalogueLoader::load`] call.
#[derive(Debug)]
pub struct LoadOutcome {
    pub snapshot: CatalogueSnapshot,
    pub origin: SnapshotOrigin,
    persistence: Option<JoinHandle<Result<(), StoreError>>>,
}

impl LoadOutcome {
    /// Wait for the background write of a fresh snapshot to finish.
    ///
    /// Returns `None` when nothing was being persisted (fallback branches).
    pub async fn persisted(&mut self) -> Option<Result<(), StoreError>> {
        let handle = self.persistence.take()?;
        Some(match handle.await {
            Ok(result) => result,
            Err(e) => Err(StoreError::Unavailable(format!("persistence task failed: {e}"))),
        })
    }

    /// Whether a background write was started and has not been awaited.
    #[must_use]
    pub const fn is_persisting(&self) -> bool {
        self.persistence.is_some()
    }
}

/// Network-first catalogue loader backed by a persistent store.
///
/// Clones share one persistence order: a snapshot is never overwritten by
/// one fetched before it.
#[derive(Clone)]
pub struct CatalogueLoader {
    source: Arc<dyn CatalogueSource>,
    store: Arc<dyn KeyValueStore>,
    /// Incremented for every successful fetch.
    fetched: Arc<AtomicU64>,
    /// Generation of the snapshot last written. Held across the write.
    written: Arc<Mutex<u64>>,
}

impl CatalogueLoader {
    #[must_use]
    pub fn new(source: Arc<dyn CatalogueSource>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            source,
            store,
            fetched: Arc::new(AtomicU64::new(0)),
            written: Arc::new(Mutex::new(0)),
        }
    }

    /// Load the catalogue once. Never fails: every error degrades to the best
    /// available list.
    pub async fn load(&self) -> LoadOutcome {
        match self.source.fetch().await {
            Ok(snapshot) => {
                let generation = self.fetched.fetch_add(1, Ordering::SeqCst) + 1;
                info!(items = snapshot.len(), generation, "Fetched catalogue");
                let persistence = self.persist_in_background(&snapshot, generation);
                LoadOutcome {
                    snapshot,
                    origin: SnapshotOrigin::Network,
                    persistence,
                }
            }
            Err(e) => {
                warn!(error = %e, "Catalogue fetch failed, reading offline copy");
                self.read_fallback().await
            }
        }
    }

    fn persist_in_background(
        &self,
        snapshot: &CatalogueSnapshot,
        generation: u64,
    ) -> Option<JoinHandle<Result<(), StoreError>>> {
        let value = match serde_json::to_value(snapshot) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Could not encode catalogue snapshot");
                return None;
            }
        };

        let store = Arc::clone(&self.store);
        let written = Arc::clone(&self.written);
        Some(tokio::spawn(async move {
            let mut written = written.lock().await;
            if *written > generation {
                debug!(generation, newer = *written, "Skipping stale catalogue snapshot");
                return Ok(());
            }

            let result = store.set(SNAPSHOT_KEY, value).await;
            match &result {
                Ok(()) => {
                    *written = generation;
                    debug!(generation, "Persisted catalogue snapshot");
                }
                Err(e) => warn!(error = %e, "Could not persist catalogue snapshot"),
            }
            result
        }))
    }

    async fn read_fallback(&self) -> LoadOutcome {
        let origin_and_snapshot =
            match store::get_json::<_, CatalogueSnapshot>(&*self.store, SNAPSHOT_KEY).await {
                Ok(Some(snapshot)) => (SnapshotOrigin::Cache, snapshot),
                Ok(None) => (SnapshotOrigin::Empty, CatalogueSnapshot::empty()),
                Err(e) => {
                    warn!(error = %e, "Offline copy unavailable");
                    (SnapshotOrigin::Empty, CatalogueSnapshot::empty())
                }
            };

        let (origin, snapshot) = origin_and_snapshot;
        info!(items = snapshot.len(), origin = %origin, "Presenting offline catalogue");
        LoadOutcome {
            snapshot,
            origin,
            persistence: None,
        }
    }
}
