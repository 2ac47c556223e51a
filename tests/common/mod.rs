//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;

use analytics_gateway::config::GatewayConfig;
use analytics_gateway::http::{AppState, HttpServer};
use analytics_gateway::lifecycle::Shutdown;
use analytics_gateway::store::MemoryStore;

/// Gateway configuration tuned for fast, deterministic tests.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.downstream.failure_rate = 0.0;
    config.downstream.latency_min_ms = 0;
    config.downstream.latency_max_ms = 0;
    config
}

/// Spawn a gateway on an ephemeral port with its own in-process store.
///
/// Returns the bound address, the shutdown handle, and the app state
/// (for runtime tuning of the simulated downstream).
pub async fn spawn_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown, AppState) {
    let store = Arc::new(MemoryStore::new());
    let server = HttpServer::new(&config, store);
    let state = server.state();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let watcher = shutdown.watcher();
    tokio::spawn(async move {
        let _ = server.run(listener, watcher).await;
    });

    (addr, shutdown, state)
}

/// HTTP client that will not pick up a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// JSON body for a metric ingestion request.
pub fn metric_body(kind: &str, value: f64) -> serde_json::Value {
    serde_json::json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "value": value,
        "type": kind,
    })
}
