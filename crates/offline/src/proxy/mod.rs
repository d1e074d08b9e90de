//! Network interception proxy.
//!
//! Every request from a controlled page is dispatched by resource type:
//!
//! - **Images** are *cache-first*: a cached copy is returned without touching
//!   the network; on a miss the network response is cached and returned.
//!   At most one network round trip per image URL for the life of the cache.
//! - **Everything else** (documents, API calls) is *network-first*: the fresh
//!   response is cached and returned; when the network fails the cached copy
//!   is used, and with no copy the request fails.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = ProxyRegistry::new();
//! let registration = registry
//!     .register("/", || {
//!         InterceptionProxy::new("/", "catalogue-v1", CacheStorage::new(), network)
//!     })
//!     .await;
//! registration.proxy.activate().await?;
//!
//! let served = registration.proxy.handle(&ClientId::anonymous(), request).await?;
//! ```

pub mod cache;
pub mod lifecycle;
pub mod network;
pub mod request;
pub mod server;

pub use cache::{CacheStorage, CachedResponse, ProxyResponse, ResponseCache};
pub use lifecycle::{
    ClientId, InterceptionProxy, ProxyRegistry, ProxyState, Registration, ResponseSource, Served,
};
pub use network::{HttpNetwork, Network, NetworkError};
pub use request::{Destination, InterceptedRequest, RequestKey, Strategy};

use thiserror::Error;

/// Errors surfaced to the page by the proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Network failed and the strategy has no fallback.
    #[error("Network request failed: {0}")]
    Network(#[from] NetworkError),

    /// Network failed and nothing is cached for this request.
    #[error("Offline and no cached response for {key}")]
    Offline {
        key: RequestKey,
        #[source]
        source: NetworkError,
    },

    /// The proxy has been torn down.
    #[error("Proxy for scope {0} has been terminated")]
    Terminated(String),
}
