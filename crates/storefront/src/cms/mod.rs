//! Sanity content API client.
//!
//! # Architecture
//!
//! - Plain HTTP `GET` against the query API with a fixed GROQ projection
//! - Sanity is source of truth: no local sync, direct API calls
//! - In-memory caching via `moka` for the catalogue result (short TTL)
//!
//! # Example
//!
//! ```rust,ignore
//! use catalogue_storefront::cms::SanityClient;
//!
//! let client = SanityClient::new(&config.sanity)?;
//! let items = client.catalogue().await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use catalogue_core::{CatalogueItem, CatalogueSnapshot, ImageRef};
use catalogue_offline::{CatalogueSource, FetchError};
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::SanityConfig;

/// Query returning every catalogue item, newest model first.
pub const CATALOGUE_QUERY: &str = r#"*[_type == "catalogueItem"] | order(modelNumber desc){_id, modelNumber, image, sizes, weightAdult, weightKids}"#;

/// Image CDN host.
const IMAGE_CDN: &str = "https://cdn.sanity.io";

/// Errors that can occur when querying the content API.
#[derive(Debug, Error)]
pub enum CmsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the query API.
    #[error("Content API returned {status}: {message}")]
    Status { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Query URL could not be built from configuration.
    #[error("Invalid query URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Query API response envelope.
#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    result: T,
}

/// Client for the Sanity query API.
///
/// The catalogue result is cached for the configured TTL.
#[derive(Clone)]
pub struct SanityClient {
    inner: Arc<SanityClientInner>,
}

struct SanityClientInner {
    client: reqwest::Client,
    query_url: Url,
    project_id: String,
    dataset: String,
    token: Option<SecretString>,
    cache: Option<Cache<&'static str, CatalogueSnapshot>>,
}

impl SanityClient {
    /// Create a new content API client.
    ///
    /// # Errors
    ///
    /// Returns `CmsError::Url` if the configured host or project id does not
    /// form a valid URL.
    pub fn new(config: &SanityConfig) -> Result<Self, CmsError> {
        let cache = config.cache_ttl.map(|ttl| {
            Cache::builder()
                .max_capacity(8)
                .time_to_live(ttl)
                .build()
        });

        Ok(Self {
            inner: Arc::new(SanityClientInner {
                client: reqwest::Client::new(),
                query_url: query_url(config)?,
                project_id: config.project_id.clone(),
                dataset: config.dataset.clone(),
                token: config.token.clone(),
                cache,
            }),
        })
    }

    /// Base query endpoint, without the `query` parameter.
    #[must_use]
    pub fn query_url(&self) -> &Url {
        &self.inner.query_url
    }

    /// Fetch all catalogue items ordered by descending model number.
    ///
    /// # Errors
    ///
    /// Returns `CmsError` if the request fails or the result is not a list of
    /// catalogue items. Failures are never cached.
    #[instrument(skip(self))]
    pub async fn catalogue(&self) -> Result<CatalogueSnapshot, CmsError> {
        let Some(cache) = &self.inner.cache else {
            return self.query::<Vec<CatalogueItem>>(CATALOGUE_QUERY).await.map(Into::into);
        };

        if let Some(snapshot) = cache.get(CATALOGUE_QUERY).await {
            debug!(items = snapshot.len(), "Catalogue cache hit");
            return Ok(snapshot);
        }

        let snapshot: CatalogueSnapshot = self
            .query::<Vec<CatalogueItem>>(CATALOGUE_QUERY)
            .await?
            .into();
        cache.insert(CATALOGUE_QUERY, snapshot.clone()).await;
        Ok(snapshot)
    }

    /// Drop cached results so the next call goes to the API.
    pub fn invalidate(&self) {
        if let Some(cache) = &self.inner.cache {
            cache.invalidate_all();
        }
    }

    /// Run a GROQ query and decode its `result`.
    async fn query<T: serde::de::DeserializeOwned>(&self, groq: &str) -> Result<T, CmsError> {
        let mut url = self.inner.query_url.clone();
        url.query_pairs_mut().append_pair("query", groq);

        let mut request = self.inner.client.get(url).header("Accept", "application/json");
        if let Some(token) = &self.inner.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Content API returned non-success status"
            );
            return Err(CmsError::Status {
                status: status.as_u16(),
                message: response_text.chars().take(200).collect(),
            });
        }

        match serde_json::from_str::<QueryResponse<T>>(&response_text) {
            Ok(response) => Ok(response.result),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse content API response"
                );
                Err(CmsError::Parse(e))
            }
        }
    }

    /// Public CDN URL for an image, scaled to `width` pixels.
    ///
    /// Returns `None` when the asset reference is not an image asset id.
    #[must_use]
    pub fn image_url(&self, image: &ImageRef, width: u32) -> Option<String> {
        image_url(&self.inner.project_id, &self.inner.dataset, image, width)
    }
}

/// Build `{host}/v{version}/data/query/{dataset}`.
fn query_url(config: &SanityConfig) -> Result<Url, url::ParseError> {
    let host = match &config.api_host {
        Some(host) => host.clone(),
        None => {
            let api = if config.use_cdn { "apicdn" } else { "api" };
            Url::parse(&format!("https://{}.{api}.sanity.io", config.project_id))?
        }
    };
    host.join(&format!(
        "v{}/data/query/{}",
        config.api_version, config.dataset
    ))
}

/// Failed queries are never cached, so a fetch after an outage goes back to
/// the content API.
#[async_trait]
impl CatalogueSource for SanityClient {
    async fn fetch(&self) -> Result<CatalogueSnapshot, FetchError> {
        self.catalogue().await.map_err(|e| match e {
            CmsError::Http(e) => FetchError::Http(e),
            CmsError::Parse(e) => FetchError::Parse(e),
            CmsError::Status { status, .. } => FetchError::Status(status),
            other => FetchError::Unavailable(other.to_string()),
        })
    }
}

/// Map an asset reference like `image-<id>-<W>x<H>-<ext>` onto the image CDN.
#[must_use]
pub fn image_url(project_id: &str, dataset: &str, image: &ImageRef, width: u32) -> Option<String> {
    let reference = image.asset_ref().strip_prefix("image-")?;
    let (stem, ext) = reference.rsplit_once('-')?;
    let (id, dimensions) = stem.rsplit_once('-')?;
    let (w, h) = dimensions.split_once('x')?;
    if id.is_empty() || ext.is_empty() || w.parse::<u32>().is_err() || h.parse::<u32>().is_err() {
        return None;
    }

    Some(format!(
        "{IMAGE_CDN}/images/{project_id}/{dataset}/{stem}.{ext}?w={width}"
    ))
}
