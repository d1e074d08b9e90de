//! Interception proxy lifecycle and per-request dispatch.
//!
//! # States
//!
//! ```text
//! Installing --activate()--> Active --terminate()--> Terminated
//! ```
//!
//! While installing, requests go straight to the network and nothing is
//! cached. Activation claims every page already attached, so interception
//! starts without a reload. Pages attaching after activation are controlled
//! immediately.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::ProxyError;
use super::cache::{CacheStorage, ProxyResponse, ResponseCache};
use super::network::Network;
use super::request::{InterceptedRequest, Strategy};

catalogue_core::define_id!(ClientId);

impl ClientId {
    /// Client ID used when a page does not identify itself.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }
}

/// Lifecycle state of an [`InterceptionProxy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    Installing,
    Active,
    Terminated,
}

impl std::fmt::Display for ProxyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Installing => "installing",
            Self::Active => "active",
            Self::Terminated => "terminated",
        })
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Fresh from the network and cached.
    Network,
    /// Replayed from the response cache.
    Cache,
    /// Fresh from the network, not intercepted.
    PassThrough,
}

impl ResponseSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Cache => "cache",
            Self::PassThrough => "pass-through",
        }
    }
}

/// A response handed back to the page.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: ProxyResponse,
    pub source: ResponseSource,
}

/// Most pages tracked at once. Least-used pages are forgotten first.
pub const MAX_CLIENTS: u64 = 10_000;

/// Pages that send nothing for this long are forgotten.
pub const CLIENT_IDLE: Duration = Duration::from_secs(30 * 60);

/// Caching proxy sitting between pages and the network.
pub struct InterceptionProxy {
    scope: String,
    cache_name: String,
    caches: CacheStorage,
    network: Arc<dyn Network>,
    state: RwLock<ProxyState>,
    /// Attached pages and whether each is controlled.
    ///
    /// A forgotten page is re-attached on its next request with the control
    /// it would get as a new page, which is the control it already had.
    clients: Cache<ClientId, bool>,
}

impl std::fmt::Debug for InterceptionProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionProxy")
            .field("scope", &self.scope)
            .field("cache_name", &self.cache_name)
            .finish_non_exhaustive()
    }
}

impl InterceptionProxy {
    /// Create a proxy in the `Installing` state.
    #[must_use]
    pub fn new(
        scope: impl Into<String>,
        cache_name: impl Into<String>,
        caches: CacheStorage,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            scope: scope.into(),
            cache_name: cache_name.into(),
            caches,
            network,
            state: RwLock::new(ProxyState::Installing),
            clients: client_cache(MAX_CLIENTS, CLIENT_IDLE),
        }
    }

    /// Replace the client tracking limits.
    #[must_use]
    pub fn with_client_limits(mut self, max_clients: u64, idle: Duration) -> Self {
        self.clients = client_cache(max_clients, idle);
        self
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    #[must_use]
    pub const fn caches(&self) -> &CacheStorage {
        &self.caches
    }

    pub async fn state(&self) -> ProxyState {
        *self.state.read().await
    }

    /// Install phase: open the response cache namespace.
    pub async fn install(&self) -> ResponseCache {
        let cache = self.caches.open(&self.cache_name).await;
        info!(scope = %self.scope, cache = %self.cache_name, "Proxy installed");
        cache
    }

    /// Switch to `Active` and claim every attached page.
    ///
    /// Returns how many pages were newly claimed. Activating an active proxy
    /// claims nothing and is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Terminated` if the proxy has been torn down.
    pub async fn activate(&self) -> Result<usize, ProxyError> {
        let mut state = self.state.write().await;
        match *state {
            ProxyState::Terminated => return Err(ProxyError::Terminated(self.scope.clone())),
            ProxyState::Active => return Ok(0),
            ProxyState::Installing => {}
        }

        *state = ProxyState::Active;
        let unclaimed: Vec<Arc<ClientId>> = self
            .clients
            .iter()
            .filter(|(_, controlled)| !*controlled)
            .map(|(client, _)| client)
            .collect();
        for client in &unclaimed {
            self.clients.insert(ClientId::clone(client), true).await;
        }

        let claimed = unclaimed.len();
        info!(scope = %self.scope, claimed, "Proxy activated");
        Ok(claimed)
    }

    /// Stop intercepting. Requests pass straight through afterwards.
    pub async fn terminate(&self) {
        let mut state = self.state.write().await;
        *state = ProxyState::Terminated;
        let clients: Vec<Arc<ClientId>> = self.clients.iter().map(|(client, _)| client).collect();
        for client in &clients {
            self.clients.insert(ClientId::clone(client), false).await;
        }
        info!(scope = %self.scope, "Proxy terminated");
    }

    /// Register an open page. Returns whether the page is controlled.
    pub async fn attach(&self, client: &ClientId) -> bool {
        if let Some(controlled) = self.clients.get(client).await {
            return controlled;
        }

        // Held while inserting so activation cannot miss this page.
        let state = self.state.read().await;
        let controlled = self
            .clients
            .entry_by_ref(client)
            .or_insert(*state == ProxyState::Active)
            .await
            .into_value();
        debug!(client = %client, controlled, "Client attached");
        controlled
    }

    /// Forget a closed page.
    pub async fn detach(&self, client: &ClientId) {
        self.clients.invalidate(client).await;
    }

    pub async fn is_controlled(&self, client: &ClientId) -> bool {
        self.clients.get(client).await.unwrap_or(false)
    }

    /// Number of pages currently attached.
    pub async fn client_count(&self) -> usize {
        self.clients.run_pending_tasks().await;
        usize::try_from(self.clients.entry_count()).unwrap_or(usize::MAX)
    }

    /// Handle one request from `client`.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Network` when the network fails and the strategy
    /// has no cached fallback, or `ProxyError::Offline` when a network-first
    /// request fails with nothing cached.
    pub async fn handle(
        &self,
        client: &ClientId,
        request: InterceptedRequest,
    ) -> Result<Served, ProxyError> {
        if !self.attach(client).await {
            return self.pass_through(&request).await;
        }

        match request.strategy() {
            Strategy::CacheFirst => self.cache_first(&request).await,
            Strategy::NetworkFirst => self.network_first(&request).await,
        }
    }

    async fn pass_through(&self, request: &InterceptedRequest) -> Result<Served, ProxyError> {
        let response = self.network.fetch(request).await?;
        Ok(Served {
            response,
            source: ResponseSource::PassThrough,
        })
    }

    async fn cache_first(&self, request: &InterceptedRequest) -> Result<Served, ProxyError> {
        let cache = self.caches.open(&self.cache_name).await;

        if let Some(hit) = cache.match_request(request).await {
            debug!(key = %request.key(), "Cache hit");
            return Ok(Served {
                response: hit.response,
                source: ResponseSource::Cache,
            });
        }

        debug!(key = %request.key(), "Cache miss, fetching");
        let response = self.network.fetch(request).await?;
        if is_storable(&response) {
            cache.put(request, &response).await;
        }

        Ok(Served {
            response,
            source: ResponseSource::Network,
        })
    }

    async fn network_first(&self, request: &InterceptedRequest) -> Result<Served, ProxyError> {
        let cache = self.caches.open(&self.cache_name).await;

        match self.network.fetch(request).await {
            Ok(response) => {
                if is_storable(&response) {
                    cache.put(request, &response).await;
                }
                Ok(Served {
                    response,
                    source: ResponseSource::Network,
                })
            }
            Err(source) => {
                let key = request.key();
                if let Some(hit) = cache.match_request(request).await {
                    warn!(key = %key, error = %source, "Network failed, serving cached response");
                    return Ok(Served {
                        response: hit.response,
                        source: ResponseSource::Cache,
                    });
                }
                warn!(key = %key, error = %source, "Network failed and nothing cached");
                Err(ProxyError::Offline { key, source })
            }
        }
    }
}

fn client_cache(max_clients: u64, idle: Duration) -> Cache<ClientId, bool> {
    Cache::builder()
        .max_capacity(max_clients)
        .time_to_idle(idle)
        .build()
}

/// Only complete successful responses are worth replaying offline.
fn is_storable(response: &ProxyResponse) -> bool {
    response.status.is_success() && response.status != axum::http::StatusCode::PARTIAL_CONTENT
}

/// A proxy returned from [`ProxyRegistry::register`].
#[derive(Debug, Clone)]
pub struct Registration {
    pub proxy: Arc<InterceptionProxy>,
    /// `false` when an existing live proxy was returned.
    pub newly_installed: bool,
}

/// Startup-owned registry of proxies, one per scope.
#[derive(Debug, Default)]
pub struct ProxyRegistry {
    proxies: Mutex<HashMap<String, Arc<InterceptionProxy>>>,
}

impl ProxyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a proxy for `scope`, installing it if needed.
    ///
    /// Re-registering a scope whose proxy is still live is a no-op that
    /// returns the existing proxy; `build` is not called.
    pub async fn register(
        &self,
        scope: &str,
        build: impl FnOnce() -> InterceptionProxy + Send,
    ) -> Registration {
        let mut proxies = self.proxies.lock().await;

        if let Some(existing) = proxies.get(scope)
            && existing.state().await != ProxyState::Terminated
        {
            debug!(scope, "Proxy already registered");
            return Registration {
                proxy: Arc::clone(existing),
                newly_installed: false,
            };
        }

        let proxy = Arc::new(build());
        proxy.install().await;
        proxies.insert(scope.to_string(), Arc::clone(&proxy));

        Registration {
            proxy,
            newly_installed: true,
        }
    }

    pub async fn get(&self, scope: &str) -> Option<Arc<InterceptionProxy>> {
        self.proxies.lock().await.get(scope).cloned()
    }

    /// Terminate and remove the proxy for `scope`. Returns whether one existed.
    pub async fn unregister(&self, scope: &str) -> bool {
        let removed = self.proxies.lock().await.remove(scope);
        match removed {
            Some(proxy) => {
                proxy.terminate().await;
                true
            }
            None => false,
        }
    }
}
