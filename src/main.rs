//! Analytics Ingestion Gateway
//!
//! A small analytics service built with Tokio and Axum whose core is a
//! resilience layer between clients and two external collaborators.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │               ANALYTICS GATEWAY               │
//!                    │                                               │
//!   Client Request   │  ┌────────┐   ┌───────────────────────────┐  │
//!   ─────────────────┼─▶│  http  │──▶│        resilience          │  │
//!                    │  │ server │   │ rate_limit / cache / breaker│ │
//!                    │  └────────┘   └──────┬──────────────┬──────┘  │
//!                    │                      │              │         │
//!                    │                      ▼              ▼         │
//!                    │              ┌────────────┐  ┌────────────┐   │
//!                    │              │   store    │  │ downstream │   │
//!                    │              │ (counters, │  │ (simulated,│   │
//!                    │              │  cache)    │  │  unreliable)│  │
//!                    │              └────────────┘  └────────────┘   │
//!                    │                                               │
//!                    │  ingest: in-memory record log + aggregation   │
//!                    │  cross-cutting: config, observability,        │
//!                    │                 lifecycle                     │
//!                    └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use analytics_gateway::config::{load_config, GatewayConfig};
use analytics_gateway::http::HttpServer;
use analytics_gateway::lifecycle::Shutdown;
use analytics_gateway::store::{MemoryStore, RedisStore, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreBackend {
    /// Shared Redis store (production).
    Redis,
    /// In-process store; admission counts are not shared across instances.
    Memory,
}

#[derive(Parser)]
#[command(name = "analytics-gateway", version)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Store backend to connect.
    #[arg(long, value_enum, default_value_t = StoreBackend::Redis)]
    store: StoreBackend,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "analytics_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("analytics-gateway v0.1.0 starting");

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit = config.rate_limit.limit,
        rate_window_secs = config.rate_limit.window_secs,
        cache_ttl_secs = config.cache.ttl_secs,
        failure_threshold = config.circuit_breaker.failure_threshold,
        reset_timeout_secs = config.circuit_breaker.reset_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            analytics_gateway::observability::metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let store: Arc<dyn Store> = match args.store {
        StoreBackend::Redis => Arc::new(RedisStore::connect(&config.store.url).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-process store; counters are not shared across instances");
            Arc::new(MemoryStore::new())
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let watcher = shutdown.watcher();
    tokio::spawn(shutdown.trigger_on_ctrl_c());

    let server = HttpServer::new(&config, store);
    server.run(listener, watcher).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
