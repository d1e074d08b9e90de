//! `proxy` command: serve the interception proxy.
//!
//! Registers one proxy for the whole origin (`/`), activates it so every page
//! is controlled from its first request, and serves it until Ctrl+C or
//! SIGTERM.

use std::sync::Arc;

use catalogue_offline::OfflineConfig;
use catalogue_offline::proxy::{
    CacheStorage, HttpNetwork, InterceptionProxy, NetworkError, ProxyError, ProxyRegistry, server,
};
use thiserror::Error;

/// Scope covering every path on the upstream origin.
const ROOT_SCOPE: &str = "/";

/// Errors that stop the proxy command.
#[derive(Debug, Error)]
pub enum ProxyCommandError {
    #[error("Could not build HTTP client: {0}")]
    Network(#[from] NetworkError),

    #[error("Could not activate proxy: {0}")]
    Activate(#[from] ProxyError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Register, activate and serve the proxy.
pub async fn serve(config: &OfflineConfig) -> Result<(), ProxyCommandError> {
    let network = Arc::new(HttpNetwork::new(config.fetch_timeout)?);
    let registry = ProxyRegistry::new();

    let cache_name = config.cache_name.clone();
    let registration = registry
        .register(ROOT_SCOPE, move || {
            InterceptionProxy::new(ROOT_SCOPE, cache_name, CacheStorage::new(), network)
        })
        .await;
    let proxy = registration.proxy;
    proxy.activate().await?;

    let app = server::router(Arc::clone(&proxy), config.upstream_url.clone());

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        "proxy listening on {} (upstream {}, cache {})",
        addr,
        config.upstream_url,
        config.cache_name
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.unregister(ROOT_SCOPE).await;
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping proxy");
}
