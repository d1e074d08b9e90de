//! `browse` command: load the catalogue once and print it.
//!
//! Runs the network-first loader against `{base_url}/api/catalogue` with the
//! file store as fallback, waits for the fresh snapshot to be persisted, and
//! prints the items as a table.

use std::fmt::Write as _;
use std::sync::Arc;

use catalogue_core::{CatalogueSnapshot, SizeTag};
use catalogue_offline::config::catalogue_endpoint;
use catalogue_offline::{
    CatalogueLoader, FetchError, FileStore, HttpCatalogueSource, OfflineConfig, StoreError,
};
use thiserror::Error;
use url::Url;

/// Errors that stop the browse command.
#[derive(Debug, Error)]
pub enum BrowseError {
    #[error("Invalid base URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Could not build HTTP client: {0}")]
    Client(#[from] FetchError),

    #[error("Could not open store: {0}")]
    Store(#[from] StoreError),
}

/// Load the catalogue and print it.
pub async fn run(config: &OfflineConfig, base_url: &Url) -> Result<(), BrowseError> {
    let endpoint = catalogue_endpoint(base_url)?;
    let source = HttpCatalogueSource::new(endpoint, config.fetch_timeout)?;
    let store = FileStore::open(&config.store_dir).await?;
    let loader = CatalogueLoader::new(Arc::new(source), Arc::new(store));

    let mut outcome = loader.load().await;
    if let Some(Err(e)) = outcome.persisted().await {
        tracing::warn!("Snapshot not saved for offline use: {e}");
    }

    let table = render_table(&outcome.snapshot);

    #[allow(clippy::print_stdout)]
    {
        println!("Source: {} ({} items)", outcome.origin, outcome.snapshot.len());
        print!("{table}");
    }

    Ok(())
}

/// Render items as a fixed-width table.
///
/// Only weights for offered sizes are shown. Kids weights carry a `K-` prefix.
#[must_use]
pub fn render_table(snapshot: &CatalogueSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<8} {:<12} {:<16} {}", "MODEL", "SIZES", "WEIGHTS", "IMAGE");

    for item in snapshot.items() {
        let visible = item.visible_sizes();
        let sizes = if visible.is_empty() {
            "-".to_string()
        } else {
            visible
                .iter()
                .map(|(tag, _)| tag.label())
                .collect::<Vec<_>>()
                .join(",")
        };
        let weights = visible
            .iter()
            .filter_map(|(tag, weight)| {
                let grams = weight.filter(|w| *w > 0.0)?;
                Some(match tag {
                    SizeTag::Adult => format!("{grams}g"),
                    SizeTag::Kids => format!("K-{grams}g"),
                })
            })
            .collect::<Vec<_>>()
            .join(" ");
        let weights = if weights.is_empty() { "-".to_string() } else { weights };
        let image = if item.image.is_some() { "yes" } else { "no" };

        let _ = writeln!(out, "{:<8} {:<12} {:<16} {}", item.title(), sizes, weights, image);
    }

    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use catalogue_core::{CatalogueItem, ImageRef};

    use super::*;

    #[test]
    fn test_render_table_respects_size_tags() {
        let mut tagged = CatalogueItem::new("a", 104);
        tagged.sizes = Some(vec![SizeTag::Adult, SizeTag::Kids]);
        tagged.weight_adult = Some(12.5);
        tagged.weight_kids = Some(7.0);
        tagged.image = Some(ImageRef::new("image-abc-10x10-png"));

        let mut untagged = CatalogueItem::new("b", 103);
        untagged.weight_adult = Some(99.0);

        let table = render_table(&CatalogueSnapshot::new(vec![tagged, untagged]));
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("MODEL"));
        assert!(lines[1].starts_with("B104"));
        assert!(lines[1].contains("Adult,Kids"));
        assert!(lines[1].contains("12.5g K-7g"));
        assert!(lines[1].ends_with("yes"));
        assert!(lines[2].starts_with("B103"));
        assert!(!lines[2].contains("99"));
        assert!(lines[2].ends_with("no"));
    }

    #[test]
    fn test_render_empty_table() {
        let table = render_table(&CatalogueSnapshot::empty());
        assert_eq!(table.lines().count(), 1);
    }
}
