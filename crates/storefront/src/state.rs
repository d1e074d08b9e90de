//! Application state shared across handlers.

use std::sync::Arc;

use catalogue_offline::{CatalogueLoader, KeyValueStore};

use crate::cms::{CmsError, SanityClient};
use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    cms: SanityClient,
    loader: CatalogueLoader,
}

impl AppState {
    /// Create a new application state.
    ///
    /// `snapshots` keeps the last good catalogue for when the content API is
    /// unreachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the content API client cannot be built from the
    /// configuration.
    pub fn new(
        config: StorefrontConfig,
        snapshots: Arc<dyn KeyValueStore>,
    ) -> Result<Self, CmsError> {
        let cms = SanityClient::new(&config.sanity)?;
        let loader = CatalogueLoader::new(Arc::new(cms.clone()), snapshots);
        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                cms,
                loader,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the content API client.
    #[must_use]
    pub fn cms(&self) -> &SanityClient {
        &self.inner.cms
    }

    /// Catalogue loader reading through the content API with a stored
    /// fallback.
    #[must_use]
    pub fn loader(&self) -> &CatalogueLoader {
        &self.inner.loader
    }
}
