//! The last-known catalogue payload.

use serde::{Deserialize, Serialize};

use super::item::CatalogueItem;

/// Well-known store key the snapshot lives under.
pub const SNAPSHOT_KEY: &str = "items";

/// Ordered list of catalogue items as last fetched.
///
/// Serialized as a bare JSON array, the same shape the catalogue API returns.
/// A snapshot is always replaced wholesale; there is no merging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogueSnapshot(Vec<CatalogueItem>);

impl CatalogueSnapshot {
    /// Create a snapshot from items in the order received.
    #[must_use]
    pub const fn new(items: Vec<CatalogueItem>) -> Self {
        Self(items)
    }

    /// An empty snapshot.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Items in order.
    #[must_use]
    pub fn items(&self) -> &[CatalogueItem] {
        &self.0
    }

    /// Consume the snapshot and return its items.
    #[must_use]
    pub fn into_items(self) -> Vec<CatalogueItem> {
        self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Split into display pages of at most `per_page` items.
    ///
    /// A `per_page` of zero yields a single page holding everything.
    #[must_use]
    pub fn pages(&self, per_page: usize) -> Vec<&[CatalogueItem]> {
        if per_page == 0 {
            return vec![self.0.as_slice()];
        }
        self.0.chunks(per_page).collect()
    }
}

impl From<Vec<CatalogueItem>> for CatalogueSnapshot {
    fn from(items: Vec<CatalogueItem>) -> Self {
        Self(items)
    }
}

impl IntoIterator for CatalogueSnapshot {
    type Item = CatalogueItem;
    type IntoIter = std::vec::IntoIter<CatalogueItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
