//! Catalogue grid page.
//!
//! The grid is read through the catalogue loader. When the content API is
//! down the last good snapshot is shown with a notice, or an empty grid when
//! there is none.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Query, State};
use catalogue_core::{CatalogueItem, CatalogueSnapshot, SizeTag};
use catalogue_offline::SnapshotOrigin;
use serde::Deserialize;
use tracing::instrument;

use crate::cms::SanityClient;
use crate::error::{AppError, Result};
use crate::filters;
use crate::routes::manifest::THEME_COLOR;
use crate::state::AppState;

/// Items per printed catalogue page.
pub const ITEMS_PER_PAGE: usize = 4;

/// Thumbnail width in the grid.
const THUMB_WIDTH: u32 = 800;

/// Width of the full-size image an item links to.
const FULL_WIDTH: u32 = 1200;

/// Query parameters for the grid.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// One-based page number. All pages are shown when absent.
    pub page: Option<usize>,
}

/// Weight badge for one offered size.
#[derive(Clone)]
pub struct WeightView {
    pub label: &'static str,
    pub grams: f64,
}

/// Item display data for templates.
#[derive(Clone)]
pub struct ItemView {
    pub id: String,
    pub title: String,
    pub image_url: Option<String>,
    pub full_image_url: Option<String>,
    pub weights: Vec<WeightView>,
}

impl ItemView {
    fn new(item: &CatalogueItem, cms: &SanityClient) -> Self {
        let weights = item
            .visible_sizes()
            .into_iter()
            .filter_map(|(tag, weight)| {
                // Zero or missing weights are not shown.
                let grams = weight.filter(|w| *w > 0.0)?;
                let label = match tag {
                    SizeTag::Adult => "",
                    SizeTag::Kids => "K-",
                };
                Some(WeightView { label, grams })
            })
            .collect();

        Self {
            id: item.id.to_string(),
            title: item.title(),
            image_url: item
                .image
                .as_ref()
                .and_then(|image| cms.image_url(image, THUMB_WIDTH)),
            full_image_url: item
                .image
                .as_ref()
                .and_then(|image| cms.image_url(image, FULL_WIDTH)),
            weights,
        }
    }
}

/// One printed page of the catalogue.
#[derive(Clone)]
pub struct PageView {
    /// One-based page number.
    pub number: usize,
    pub items: Vec<ItemView>,
    /// Empty slots that keep a short last page at full size.
    pub placeholders: usize,
}

/// Split a snapshot into display pages.
#[must_use]
pub fn page_views(snapshot: &CatalogueSnapshot, cms: &SanityClient) -> Vec<PageView> {
    snapshot
        .pages(ITEMS_PER_PAGE)
        .into_iter()
        .enumerate()
        .map(|(index, items)| PageView {
            number: index + 1,
            items: items.iter().map(|item| ItemView::new(item, cms)).collect(),
            placeholders: ITEMS_PER_PAGE.saturating_sub(items.len()),
        })
        .collect()
}

/// Catalogue grid template.
#[derive(Template, WebTemplate)]
#[template(path = "catalogue/index.html")]
pub struct CatalogueTemplate {
    pub pages: Vec<PageView>,
    pub total_pages: usize,
    /// Selected page, when a single page is shown.
    pub current: Option<usize>,
    pub origin: SnapshotOrigin,
    pub theme_color: &'static str,
}

impl CatalogueTemplate {
    /// Banner shown when the catalogue did not come fresh from the content API.
    #[must_use]
    pub const fn notice(&self) -> Option<&'static str> {
        match self.origin {
            SnapshotOrigin::Network => None,
            SnapshotOrigin::Cache => {
                Some("The catalogue is temporarily unavailable. Showing the last saved copy.")
            }
            SnapshotOrigin::Empty => Some("The catalogue is temporarily unavailable."),
        }
    }

    #[must_use]
    pub fn prev_page(&self) -> Option<usize> {
        self.current.filter(|page| *page > 1).map(|page| page - 1)
    }

    #[must_use]
    pub fn next_page(&self) -> Option<usize> {
        self.current
            .filter(|page| *page < self.total_pages)
            .map(|page| page + 1)
    }
}

/// Display the catalogue grid.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for page `0` and `AppError::NotFound` for a
/// page past the end. A content API failure is not an error here.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<CatalogueTemplate> {
    let outcome = state.loader().load().await;
    let mut pages = page_views(&outcome.snapshot, state.cms());
    let total_pages = pages.len();

    let current = match query.page {
        None => None,
        Some(0) => return Err(AppError::BadRequest("page numbers start at 1".to_string())),
        Some(page) if page > total_pages => {
            return Err(AppError::NotFound(format!("page {page}")));
        }
        Some(page) => {
            pages = pages.into_iter().skip(page - 1).take(1).collect();
            Some(page)
        }
    };

    Ok(CatalogueTemplate {
        pages,
        total_pages,
        current,
        origin: outcome.origin,
        theme_color: THEME_COLOR,
    })
}
