//! Catalogue Core - Shared types library.
//!
//! This crate provides the catalogue data model used across all components:
//! - `offline` - Persistent store, catalogue loader and interception proxy
//! - `storefront` - Public catalogue site and the catalogue API
//! - `cli` - Command-line tools for browsing and running the proxy
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Catalogue items, size tags, image handles and snapshots

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
