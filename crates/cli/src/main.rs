//! Catalogue CLI - offline proxy and store tools.
//!
//! # Usage
//!
//! ```bash
//! # Serve the caching proxy in front of the storefront
//! catalogue-cli proxy --upstream http://127.0.0.1:3000
//!
//! # Load the catalogue once (through the proxy) and print it
//! catalogue-cli browse --base-url http://127.0.0.1:3100
//!
//! # Inspect or wipe the persisted snapshot
//! catalogue-cli store show
//! catalogue-cli store clear
//! ```
//!
//! Settings come from `OFFLINE_*` environment variables (see
//! `catalogue_offline::config`); flags override them.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::IpAddr;
use std::path::PathBuf;

use catalogue_offline::OfflineConfig;
use clap::{Parser, Subcommand};
use url::Url;

mod commands;

#[derive(Parser)]
#[command(name = "catalogue-cli")]
#[command(author, version, about = "Catalogue offline tools")]
struct Cli {
    /// Directory of the persistent store
    #[arg(long, global = true, env = "OFFLINE_STORE_DIR")]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the interception proxy and serve it
    Proxy {
        /// Origin to forward requests to
        #[arg(short, long)]
        upstream: Option<Url>,

        /// Address to bind
        #[arg(long)]
        host: Option<IpAddr>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Response cache namespace
        #[arg(long)]
        cache_name: Option<String>,
    },
    /// Load the catalogue once and print it
    Browse {
        /// Site origin serving `/api/catalogue`
        #[arg(short, long)]
        base_url: Option<Url>,

        /// Fetch timeout in seconds (0 waits indefinitely)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Inspect the persistent store
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Print stored values as JSON
    Show {
        /// Only print this key
        #[arg(short, long)]
        key: Option<String>,
    },
    /// Remove every stored value
    Clear,
}

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "catalogue_cli=info,catalogue_offline=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = OfflineConfig::from_env()?;
    if let Some(dir) = cli.store_dir {
        config.store_dir = dir;
    }

    match cli.command {
        Commands::Proxy {
            upstream,
            host,
            port,
            cache_name,
        } => {
            if let Some(upstream) = upstream {
                config.upstream_url = upstream;
            }
            if let Some(host) = host {
                config.proxy_host = host;
            }
            if let Some(port) = port {
                config.proxy_port = port;
            }
            if let Some(cache_name) = cache_name {
                config.cache_name = cache_name;
            }
            commands::proxy::serve(&config).await?;
        }
        Commands::Browse {
            base_url,
            timeout_secs,
        } => {
            if let Some(secs) = timeout_secs {
                config.fetch_timeout = (secs > 0).then(|| std::time::Duration::from_secs(secs));
            }
            let base_url = base_url.unwrap_or_else(|| config.upstream_url.clone());
            commands::browse::run(&config, &base_url).await?;
        }
        Commands::Store { action } => match action {
            StoreAction::Show { key } => commands::store::show(&config, key.as_deref()).await?,
            StoreAction::Clear => commands::store::clear(&config).await?,
        },
    }
    Ok(())
}
