//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SANITY_PROJECT_ID` - Sanity project holding the catalogue documents
//!
//! ## Optional
//! - `CATALOGUE_HOST` - Bind address (default: 127.0.0.1)
//! - `CATALOGUE_PORT` - Listen port (default: 3000)
//! - `SANITY_DATASET` - Dataset name (default: production)
//! - `SANITY_API_VERSION` - Dated API version (default: 2024-01-01)
//! - `SANITY_USE_CDN` - Query through the API CDN (default: true)
//! - `SANITY_TOKEN` - Read token for private datasets
//! - `SANITY_API_HOST` - Override the query host (self-hosted mirrors, tests)
//! - `SANITY_CACHE_TTL_SECS` - In-process result cache TTL (default: 60, 0 disables)
//! - `CATALOGUE_SNAPSHOT_DIR` - Where the last good catalogue is kept for
//!   content API outages (default: .catalogue-storefront)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Content API configuration
    pub sanity: SanityConfig,
    /// Directory holding the last good catalogue snapshot
    pub snapshot_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. production, staging)
    pub sentry_environment: Option<String>,
}

/// Sanity content API configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct SanityConfig {
    pub project_id: String,
    pub dataset: String,
    /// Dated API version without the leading `v`, e.g. `2024-01-01`.
    pub api_version: String,
    pub use_cdn: bool,
    pub token: Option<SecretString>,
    /// Replaces `https://{project}.api(cdn).sanity.io` when set.
    pub api_host: Option<Url>,
    pub cache_ttl: Option<Duration>,
}

impl std::fmt::Debug for SanityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SanityConfig")
            .field("project_id", &self.project_id)
            .field("dataset", &self.dataset)
            .field("api_version", &self.api_version)
            .field("use_cdn", &self.use_cdn)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("api_host", &self.api_host.as_ref().map(Url::as_str))
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

impl SanityConfig {
    /// Public defaults for a project, without a token or host override.
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset: "production".to_string(),
            api_version: "2024-01-01".to_string(),
            use_cdn: true,
            token: None,
            api_host: None,
            cache_ttl: Some(Duration::from_secs(60)),
        }
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token = get_optional_env(lookup, "SANITY_TOKEN").map(SecretString::from);
        let api_host = get_optional_env(lookup, "SANITY_API_HOST")
            .map(|raw| {
                Url::parse(&raw).map_err(|e| {
                    ConfigError::InvalidEnvVar("SANITY_API_HOST".to_string(), e.to_string())
                })
            })
            .transpose()?;
        let cache_ttl_secs: u64 = parse_var(
            "SANITY_CACHE_TTL_SECS",
            &get_env_or_default(lookup, "SANITY_CACHE_TTL_SECS", "60"),
        )?;

        Ok(Self {
            project_id: get_required_env(lookup, "SANITY_PROJECT_ID")?,
            dataset: get_env_or_default(lookup, "SANITY_DATASET", "production"),
            api_version: get_env_or_default(lookup, "SANITY_API_VERSION", "2024-01-01")
                .trim_start_matches('v')
                .to_string(),
            use_cdn: parse_var(
                "SANITY_USE_CDN",
                &get_env_or_default(lookup, "SANITY_USE_CDN", "true"),
            )?,
            token,
            api_host,
            cache_ttl: (cache_ttl_secs > 0).then(|| Duration::from_secs(cache_ttl_secs)),
        })
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = parse_var(
            "CATALOGUE_HOST",
            &get_env_or_default(&lookup, "CATALOGUE_HOST", "127.0.0.1"),
        )?;
        let port = parse_var(
            "CATALOGUE_PORT",
            &get_env_or_default(&lookup, "CATALOGUE_PORT", "3000"),
        )?;

        Ok(Self {
            host,
            port,
            sanity: SanityConfig::from_lookup(&lookup)?,
            snapshot_dir: PathBuf::from(get_env_or_default(
                &lookup,
                "CATALOGUE_SNAPSHOT_DIR",
                ".catalogue-storefront",
            )),
            sentry_dsn: get_optional_env(&lookup, "SENTRY_DSN"),
            sentry_environment: get_optional_env(&lookup, "SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<String, ConfigError> {
    get_optional_env(lookup, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> String {
    get_optional_env(lookup, key).unwrap_or_else(|| default.to_string())
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
