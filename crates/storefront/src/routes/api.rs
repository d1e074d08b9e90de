//! Catalogue JSON endpoint.
//!
//! Stateless pass-through of the content API result. A content API failure is
//! a `502`, which offline clients treat as a failed fetch.

use axum::{Json, extract::State};
use catalogue_core::CatalogueSnapshot;
use tracing::instrument;

use crate::error::Result;
use crate::state::AppState;

/// `GET /api/catalogue`
#[instrument(skip(state))]
pub async fn catalogue(State(state): State<AppState>) -> Result<Json<CatalogueSnapshot>> {
    let snapshot = state.cms().catalogue().await?;
    Ok(Json(snapshot))
}
