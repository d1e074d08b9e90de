//! `store` commands: inspect or clear the persistent store.

use catalogue_offline::{FileStore, KeyValueStore, OfflineConfig, StoreError};

/// Print stored values as pretty JSON, one block per key.
pub async fn show(config: &OfflineConfig, key: Option<&str>) -> Result<(), StoreError> {
    let store = FileStore::open(&config.store_dir).await?;
    let keys = match key {
        Some(key) => vec![key.to_string()],
        None => store.keys().await?,
    };

    if keys.is_empty() {
        tracing::info!("Store at {} is empty", config.store_dir.display());
        return Ok(());
    }

    for key in keys {
        let Some(value) = store.get(&key).await? else {
            tracing::info!("{key}: not set");
            continue;
        };
        let pretty = serde_json::to_string_pretty(&value)?;

        #[allow(clippy::print_stdout)]
        {
            println!("== {key}");
            println!("{pretty}");
        }
    }

    Ok(())
}

/// Remove every stored value.
pub async fn clear(config: &OfflineConfig) -> Result<(), StoreError> {
    let store = FileStore::open(&config.store_dir).await?;
    let count = store.keys().await?.len();
    store.clear().await?;
    tracing::info!("Cleared {count} keys from {}", config.store_dir.display());
    Ok(())
}
