//! Named response caches.
//!
//! A [`CacheStorage`] holds any number of named [`ResponseCache`]s. The proxy
//! uses exactly one name (for example `catalogue-v1`); deploying under a new
//! name leaves the old cache orphaned until someone deletes it.
//!
//! Entries never expire and there is no size cap.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use tokio::sync::RwLock;
use tracing::debug;

use super::request::{InterceptedRequest, RequestKey};

/// A complete HTTP response: everything needed to replay it later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyResponse {
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

/// A stored response and when it was written.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub response: ProxyResponse,
    pub stored_at: DateTime<Utc>,
}

/// One named cache of responses keyed by request identity.
#[derive(Clone)]
pub struct ResponseCache {
    name: Arc<str>,
    entries: Cache<RequestKey, CachedResponse>,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("name", &self.name)
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl ResponseCache {
    fn new(name: &str) -> Self {
        // No max_capacity and no TTL: entries live until the cache is deleted.
        Self {
            name: Arc::from(name),
            entries: Cache::builder().name(name).build(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a stored response for `request`.
    ///
    /// Non-`GET` requests never match.
    pub async fn match_request(&self, request: &InterceptedRequest) -> Option<CachedResponse> {
        self.get(&request.key()).await
    }

    pub async fn get(&self, key: &RequestKey) -> Option<CachedResponse> {
        if !key.is_cacheable() {
            return None;
        }
        self.entries.get(key).await
    }

    /// Store a copy of `response` for `request`, replacing any previous entry.
    ///
    /// Returns `false` (and stores nothing) for non-`GET` requests.
    pub async fn put(&self, request: &InterceptedRequest, response: &ProxyResponse) -> bool {
        let key = request.key();
        if !key.is_cacheable() {
            return false;
        }

        debug!(cache = %self.name, key = %key, status = %response.status, "Caching response");
        self.entries
            .insert(
                key,
                CachedResponse {
                    response: response.clone(),
                    stored_at: Utc::now(),
                },
            )
            .await;
        true
    }

    /// Remove the entry for `key`, if any.
    pub async fn delete(&self, key: &RequestKey) {
        self.entries.invalidate(key).await;
    }

    /// Request identities currently stored.
    #[must_use]
    pub fn keys(&self) -> Vec<RequestKey> {
        let mut keys: Vec<RequestKey> = self.entries.iter().map(|(k, _)| (*k).clone()).collect();
        keys.sort_by(|a, b| a.url().cmp(b.url()).then_with(|| a.method().as_str().cmp(b.method().as_str())));
        keys
    }

    /// Approximate number of stored entries.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self) {
        self.entries.invalidate_all();
    }
}

/// Collection of named response caches.
#[derive(Debug, Clone, Default)]
pub struct CacheStorage {
    caches: Arc<RwLock<BTreeMap<String, ResponseCache>>>,
}

impl CacheStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the cache called `name`, creating it if needed.
    pub async fn open(&self, name: &str) -> ResponseCache {
        if let Some(cache) = self.caches.read().await.get(name) {
            return cache.clone();
        }

        let mut caches = self.caches.write().await;
        caches
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(cache = name, "Created response cache");
                ResponseCache::new(name)
            })
            .clone()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.caches.read().await.contains_key(name)
    }

    /// Delete the cache called `name`. Returns whether it existed.
    pub async fn delete(&self, name: &str) -> bool {
        let removed = self.caches.write().await.remove(name);
        if let Some(cache) = &removed {
            cache.clear();
        }
        removed.is_some()
    }

    /// Names of all caches, sorted.
    pub async fn keys(&self) -> Vec<String> {
        self.caches.read().await.keys().cloned().collect()
    }

    /// Look up `request` across every cache, in name order.
    pub async fn match_request(&self, request: &InterceptedRequest) -> Option<CachedResponse> {
        let caches: Vec<ResponseCache> = self.caches.read().await.values().cloned().collect();
        for cache in caches {
            if let Some(hit) = cache.match_request(request).await {
                return Some(hit);
            }
        }
        None
    }
}
