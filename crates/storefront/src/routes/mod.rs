//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                 - Catalogue grid (four items per page, ?page=N for one page)
//! GET  /api/catalogue    - Catalogue items as JSON, newest model first
//! GET  /manifest.json    - Web app manifest
//! GET  /health           - Health check (registered in main)
//! GET  /static/*         - Static assets (registered in main)
//! ```

pub mod api;
pub mod catalogue;
pub mod manifest;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Create the storefront router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(catalogue::index))
        .route("/api/catalogue", get(api::catalogue))
        .route("/manifest.json", get(manifest::webmanifest))
}
