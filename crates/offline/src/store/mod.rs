//! Persistent key-value store for the last-known catalogue payload.
//!
//! # Contract
//!
//! - `set(key, value)` durably persists any JSON value under a string key
//! - `get(key)` returns the stored value, or `None` if never set or cleared
//! - overlapping writes to the same key are applied in order, last writer wins
//! - storage failures are returned as [`StoreError`], never panics; callers
//!   treat an error as "value not cached"
//!
//! Two backends are provided: [`MemoryStore`] for tests and ephemeral use,
//! and [`FileStore`] which survives restarts.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when reading or writing the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage is unavailable (disabled, full, permissions).
    #[error("Storage unavailable: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key cannot be used with this store.
    #[error("Invalid key: {0:?}")]
    InvalidKey(String),

    /// Store is unusable for another reason.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous, durable mapping from string keys to JSON values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Persist `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// All keys currently stored, sorted.
    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Remove every key.
    async fn clear(&self) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        (**self).set(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(key).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key).await
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        (**self).keys().await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }
}

/// Serialize `value` and store it under `key`.
///
/// # Errors
///
/// Returns `StoreError` if serialization or the write fails.
pub async fn set_json<S, T>(store: &S, key: &str, value: &T) -> Result<(), StoreError>
where
    S: KeyValueStore + ?Sized,
    T: Serialize + Sync,
{
    let value = serde_json::to_value(value)?;
    store.set(key, value).await
}

/// Read `key` and deserialize it into `T`.
///
/// # Errors
///
/// Returns `StoreError` if the read fails or the stored value does not
/// match `T`.
pub async fn get_json<S, T>(store: &S, key: &str) -> Result<Option<T>, StoreError>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use catalogue_core::{CatalogueItem, CatalogueSnapshot, SNAPSHOT_KEY, SizeTag};

    #[tokio::test]
    async fn test_typed_round_trip_preserves_untagged_weights() {
        let store = MemoryStore::new();
        let mut item = CatalogueItem::new("w", 12);
        item.sizes = Some(vec![SizeTag::Kids]);
        item.weight_adult = Some(410.0);
        item.weight_kids = Some(200.0);
        let snapshot = CatalogueSnapshot::new(vec![item]);

        set_json(&store, SNAPSHOT_KEY, &snapshot).await.unwrap();
        let read: CatalogueSnapshot = get_json(&store, SNAPSHOT_KEY).await.unwrap().unwrap();

        assert_eq!(read, snapshot);
        let item = read.items().first().unwrap();
        assert_eq!(item.weight_adult, Some(410.0));
        assert_eq!(item.visible_weight(SizeTag::Adult), None);
    }

    #[tokio::test]
    async fn test_get_json_type_mismatch_is_error() {
        let store = MemoryStore::new();
        store.set("items", serde_json::json!({"not": "a list"})).await.unwrap();

        let result: Result<Option<CatalogueSnapshot>, _> = get_json(&store, "items").await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_arc_dyn_store() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set("k", serde_json::json!(1)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(serde_json::json!(1)));
    }
}
