//! Catalogue item as projected by the content API.
//!
//! Field names on the wire follow the CMS projection (`_id`, `modelNumber`,
//! `weightAdult`, ...). Items are kept exactly as received so that a snapshot
//! written to the offline store reads back unchanged.

use serde::{Deserialize, Serialize};

use super::id::{ItemId, ModelNumber};

/// Size tag an item is offered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SizeTag {
    Adult,
    Kids,
}

impl SizeTag {
    /// All size tags in display order.
    pub const ALL: [Self; 2] = [Self::Adult, Self::Kids];

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Adult => "Adult",
            Self::Kids => "Kids",
        }
    }
}

impl std::fmt::Display for SizeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Reference to a CMS asset document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetReference {
    /// Asset document ID, e.g. `image-<hash>-800x800-jpg`.
    #[serde(rename = "_ref")]
    pub reference: String,
    #[serde(rename = "_type", default = "reference_type")]
    pub kind: String,
}

/// Opaque image handle attached to an item.
///
/// Any extra fields the CMS sends (crop, hotspot, ...) are carried through
/// untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(rename = "_type", default = "image_type")]
    pub kind: String,
    pub asset: AssetReference,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ImageRef {
    /// Create an image handle for an asset reference.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            kind: image_type(),
            asset: AssetReference {
                reference: reference.into(),
                kind: reference_type(),
            },
            extra: serde_json::Map::new(),
        }
    }

    /// The referenced asset document ID.
    #[must_use]
    pub fn asset_ref(&self) -> &str {
        &self.asset.reference
    }
}

fn image_type() -> String {
    "image".to_string()
}

fn reference_type() -> String {
    "reference".to_string()
}

/// A single catalogue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueItem {
    #[serde(rename = "_id")]
    pub id: ItemId,
    pub model_number: ModelNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Vec<SizeTag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_adult: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kids: Option<f64>,
}

impl CatalogueItem {
    /// Create an item with no image, sizes or weights.
    #[must_use]
    pub fn new(id: impl Into<ItemId>, model_number: i64) -> Self {
        Self {
            id: id.into(),
            model_number: ModelNumber::new(model_number),
            image: None,
            sizes: None,
            weight_adult: None,
            weight_kids: None,
        }
    }

    /// Whether the item is offered in the given size.
    #[must_use]
    pub fn has_size(&self, tag: SizeTag) -> bool {
        self.sizes.as_ref().is_some_and(|sizes| sizes.contains(&tag))
    }

    /// Raw weight stored for a size, regardless of whether the size is offered.
    #[must_use]
    pub const fn weight(&self, tag: SizeTag) -> Option<f64> {
        match tag {
            SizeTag::Adult => self.weight_adult,
            SizeTag::Kids => self.weight_kids,
        }
    }

    /// Weight that may be shown for a size.
    ///
    /// Returns `None` when the size tag is absent, even if a weight is set.
    #[must_use]
    pub fn visible_weight(&self, tag: SizeTag) -> Option<f64> {
        if self.has_size(tag) {
            self.weight(tag)
        } else {
            None
        }
    }

    /// Offered sizes paired with their displayable weight, in display order.
    #[must_use]
    pub fn visible_sizes(&self) -> Vec<(SizeTag, Option<f64>)> {
        SizeTag::ALL
            .into_iter()
            .filter(|tag| self.has_size(*tag))
            .map(|tag| (tag, self.visible_weight(tag)))
            .collect()
    }

    /// Display title, e.g. `B104`.
    #[must_use]
    pub fn title(&self) -> String {
        self.model_number.label()
    }
}
