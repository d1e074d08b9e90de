//! Catalogue Offline - the offline-capable data path.
//!
//! Three collaborating components keep the catalogue usable without a
//! network connection:
//!
//! - [`store`] - durable key-value store holding the last catalogue snapshot
//! - [`loader`] - network-first catalogue read that falls back to the store
//! - [`proxy`] - request interception with cache-first (images) and
//!   network-first (everything else) strategies
//!
//! # Flow
//!
//! ```text
//! client start
//!   -> CatalogueLoader::load()
//!        -> GET /api/catalogue (through the InterceptionProxy)
//!             -> network-first: fresh response cached, or cached copy on failure
//!        -> success: snapshot persisted under "items" in the background
//!        -> failure: snapshot read back from the store (or empty)
//!   -> items rendered
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod loader;
pub mod proxy;
pub mod store;

pub use config::{ConfigError, OfflineConfig};
pub use loader::{
    CatalogueLoader, CatalogueSource, FetchError, HttpCatalogueSource, LoadOutcome, SnapshotOrigin,
};
pub use proxy::{InterceptionProxy, ProxyError, ProxyRegistry, ProxyState};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
