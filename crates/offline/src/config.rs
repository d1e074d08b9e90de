//! Offline data path configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `OFFLINE_CACHE_NAME` - Response cache namespace (default: catalogue-v1)
//! - `OFFLINE_STORE_DIR` - Directory for the persistent store (default: .catalogue-store)
//! - `OFFLINE_UPSTREAM_URL` - Origin the proxy forwards to (default: <http://127.0.0.1:3000>)
//! - `OFFLINE_PROXY_HOST` - Proxy bind address (default: 127.0.0.1)
//! - `OFFLINE_PROXY_PORT` - Proxy listen port (default: 3100)
//! - `OFFLINE_FETCH_TIMEOUT_SECS` - Network timeout in seconds, 0 disables (default: 10)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default response cache namespace. Bump the version suffix to orphan
/// every previously cached response.
pub const DEFAULT_CACHE_NAME: &str = "catalogue-v1";

/// Path of the catalogue API relative to the site origin.
pub const CATALOGUE_API_PATH: &str = "/api/catalogue";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Offline data path configuration.
#[derive(Debug, Clone)]
pub struct OfflineConfig {
    /// Response cache namespace
    pub cache_name: String,
    /// Directory holding the persistent store
    pub store_dir: PathBuf,
    /// Origin the interception proxy forwards to
    pub upstream_url: Url,
    /// IP address the proxy binds to
    pub proxy_host: IpAddr,
    /// Port the proxy listens on
    pub proxy_port: u16,
    /// Network timeout; `None` waits indefinitely
    pub fetch_timeout: Option<Duration>,
}

impl OfflineConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let cache_name = get("OFFLINE_CACHE_NAME", DEFAULT_CACHE_NAME);
        if cache_name.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "OFFLINE_CACHE_NAME".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let store_dir = PathBuf::from(get("OFFLINE_STORE_DIR", ".catalogue-store"));
        let upstream_url = parse_var(
            "OFFLINE_UPSTREAM_URL",
            &get("OFFLINE_UPSTREAM_URL", "http://127.0.0.1:3000"),
        )?;
        let proxy_host = parse_var("OFFLINE_PROXY_HOST", &get("OFFLINE_PROXY_HOST", "127.0.0.1"))?;
        let proxy_port = parse_var("OFFLINE_PROXY_PORT", &get("OFFLINE_PROXY_PORT", "3100"))?;
        let timeout_secs: u64 = parse_var(
            "OFFLINE_FETCH_TIMEOUT_SECS",
            &get("OFFLINE_FETCH_TIMEOUT_SECS", "10"),
        )?;

        Ok(Self {
            cache_name,
            store_dir,
            upstream_url,
            proxy_host,
            proxy_port,
            fetch_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        })
    }

    /// Returns the socket address for binding the proxy.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.proxy_host, self.proxy_port)
    }
}

/// Resolve the catalogue API endpoint against a site origin.
///
/// # Errors
///
/// Returns `url::ParseError` if the joined URL is invalid.
pub fn catalogue_endpoint(base: &Url) -> Result<Url, url::ParseError> {
    base.join(CATALOGUE_API_PATH)
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
