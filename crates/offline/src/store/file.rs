//! Directory-backed store backend.
//!
//! Each key is one JSON file in the store directory. Writes go to a temporary
//! file that is renamed over the target, so a crash mid-write leaves the
//! previous value intact. A per-key async mutex keeps overlapping writes to
//! the same key sequential.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{KeyValueStore, StoreError};

const EXTENSION: &str = "json";
const TEMP_SUFFIX: &str = ".tmp";

/// Durable store keeping one file per key under a directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the directory cannot be created (including
    /// when a file is in the way), or `StoreError::Unavailable` if the path
    /// is still not a directory afterwards.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let metadata = tokio::fs::metadata(&dir).await?;
        if !metadata.is_dir() {
            return Err(StoreError::Unavailable(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        debug!(dir = %dir.display(), "Opened file store");
        Ok(Self {
            dir,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Directory the store writes to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        Ok(self.dir.join(format!("{}.{EXTENSION}", encode_key(key)?)))
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.to_string()).or_default())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    #[instrument(skip(self, value), fields(dir = %self.dir.display()))]
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let bytes = serde_json::to_vec(&value)?;

        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        let mut temp = path.clone().into_os_string();
        temp.push(TEMP_SUFFIX);
        let temp = PathBuf::from(temp);

        tokio::fs::write(&temp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(bytes = bytes.len(), "Stored value");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(key)?;

        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;

        let lock = self.lock_for(key);
        let _guard = lock.lock().await;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(&format!(".{EXTENSION}")) else {
                continue;
            };
            if let Some(key) = decode_key(stem) {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        for key in self.keys().await? {
            self.remove(&key).await?;
        }
        Ok(())
    }
}

/// Encode a key into a safe file stem.
///
/// ASCII alphanumerics, `-` and `_` are kept; every other byte becomes `%XX`.
fn encode_key(key: &str) -> Result<String, StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey(key.to_string()));
    }

    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    Ok(encoded)
}

fn decode_key(stem: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(stem.len());
    let mut iter = stem.bytes();

    while let Some(byte) = iter.next() {
        if byte == b'%' {
            let hi = iter.next()?;
            let lo = iter.next()?;
            let hex = [hi, lo];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(byte);
        }
    }

    String::from_utf8(bytes).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("items").unwrap(), "items");
        assert_eq!(encode_key("../etc").unwrap(), "%2E%2E%2Fetc");
        assert!(matches!(encode_key(""), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn test_decode_key_inverts_encode() {
        for key in ["items", "a b/c", "ünï", "%"] {
            let encoded = encode_key(key).unwrap();
            assert_eq!(decode_key(&encoded).as_deref(), Some(key));
        }
        assert_eq!(decode_key("%4"), None);
    }

    #[tokio::test]
    async fn test_value_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileStore::open(dir.path()).await.unwrap();
        store.set("items", json!([{"_id": "a", "modelNumber": 1}])).await.unwrap();
        drop(store);

        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened.get("items").await.unwrap(),
            Some(json!([{"_id": "a", "modelNumber": 1}]))
        );
    }

    #[tokio::test]
    async fn test_absent_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get("items").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overlapping_writes_are_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path()).await.unwrap());

        let mut handles = Vec::new();
        for n in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.set("items", json!(n)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Whatever write landed last, the file is a complete value.
        let value = store.get("items").await.unwrap().unwrap();
        assert!(value.as_i64().is_some_and(|n| (0..16).contains(&n)));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(TEMP_SUFFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_keys_remove_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.set("items", json!([])).await.unwrap();
        store.set("other/key", json!(true)).await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["items", "other/key"]);

        store.remove("other/key").await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["items"]);

        store.clear().await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("items.json"), b"{not json").unwrap();

        let store = FileStore::open(dir.path()).await.unwrap();
        assert!(matches!(
            store.get("items").await,
            Err(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_open_on_file_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        assert!(matches!(FileStore::open(&file).await, Err(StoreError::Io(_))));
    }

    #[tokio::test]
    async fn test_lost_directory_is_io_error() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("store");
        let store = FileStore::open(&dir).await.unwrap();

        std::fs::remove_dir(&dir).unwrap();
        std::fs::write(&dir, b"x").unwrap();

        assert!(matches!(store.keys().await, Err(StoreError::Io(_))));
        assert!(matches!(
            store.set("items", serde_json::json!([])).await,
            Err(StoreError::Io(_))
        ));
    }
}
