//! gatehouse
//!
//! Authentication resolution, access gating and fixed-window rate limiting
//! in front of a small account API.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ request id ─▶ trace ─▶ timeout
//!                                        │
//!                 ┌──────────────────────┴──────────────────────┐
//!                 ▼                      ▼                      ▼
//!          optional_auth          rate_limit "api_ip"       rate_limit
//!          (/api/feed)                  │                (auth routes,
//!                                       ▼                 /api/contact)
//!                                  require_auth
//!                                       │
//!                                       ▼
//!                                  rate_limit "api"
//!                                       │
//!                                       ▼
//!                              attach_membership ─▶ require_tier
//!                                       │
//!                                       ▼
//!                                   handlers ──▶ IdentityProvider (remote)
//!                                            ──▶ ProfileStore
//!
//!   Background: Reclaimer (expired rate limit entries)
//!   Lifecycle:  SIGINT/SIGTERM ─▶ Shutdown ─▶ drain ─▶ join reclaimer
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use gatehouse::auth::RemoteIdentityProvider;
use gatehouse::config::{load_config, validate_config, GateConfig};
use gatehouse::lifecycle::{spawn_signal_handler, Shutdown};
use gatehouse::observability::{init_logging, metrics};
use gatehouse::profile::InMemoryProfileStore;
use gatehouse::HttpServer;

#[derive(Parser)]
#[command(name = "gatehouse", version, about = "Auth and rate limiting gate")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "GATEHOUSE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            let config = GateConfig::default();
            if let Err(errors) = validate_config(&config) {
                for e in &errors {
                    eprintln!("invalid default configuration: {e}");
                }
                return Err("invalid default configuration".into());
            }
            config
        }
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gatehouse starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        identity = %config.identity.base_url,
        request_timeout_secs = config.timeouts.request_secs,
        rate_limit_enabled = config.rate_limit.enabled,
        limiters = config.rate_limit.limiters.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let provider = Arc::new(RemoteIdentityProvider::new(&config.identity)?);
    let profiles = Arc::new(InMemoryProfileStore::new());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    HttpServer::new(config, provider, profiles).run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
