//! Core types for the catalogue.
//!
//! This module provides type-safe wrappers for catalogue domain concepts.

pub mod id;
pub mod item;
pub mod snapshot;

pub use id::{ItemId, ModelNumber};
pub use item::{AssetReference, CatalogueItem, ImageRef, SizeTag};
pub use snapshot::{CatalogueSnapshot, SNAPSHOT_KEY};
