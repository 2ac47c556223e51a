//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Construct the resilience components with an injected store client
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, timeout, tracing)
//! - Serve with graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::downstream::{DownstreamTuning, ExternalService};
use crate::http::handlers;
use crate::ingest::MetricLog;
use crate::lifecycle::ShutdownWatcher;
use crate::resilience::{CircuitBreaker, RateLimiter, ResultCache};
use crate::store::Store;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<RateLimiter>,
    pub cache: Arc<ResultCache>,
    pub breaker: Arc<CircuitBreaker>,
    pub external: Arc<ExternalService>,
    pub records: Arc<MetricLog>,
    pub store: Arc<dyn Store>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Build the server and its resilience components around the given
    /// store client.
    pub fn new(config: &GatewayConfig, store: Arc<dyn Store>) -> Self {
        let admission = Arc::new(RateLimiter::new(
            store.clone(),
            config.rate_limit.limit,
            config.rate_limit.window(),
        ));
        let cache = Arc::new(ResultCache::new(store.clone(), config.cache.ttl()));
        let breaker = Arc::new(CircuitBreaker::new(
            config.circuit_breaker.failure_threshold,
            config.circuit_breaker.reset_timeout(),
        ));
        let external = Arc::new(ExternalService::new(DownstreamTuning {
            failure_rate: config.downstream.failure_rate,
            latency_min_ms: config.downstream.latency_min_ms,
            latency_max_ms: config.downstream.latency_max_ms,
        }));

        let state = AppState {
            admission,
            cache,
            breaker,
            external,
            records: Arc::new(MetricLog::new()),
            store,
        };

        let router = Self::build_router(config, state.clone());
        Self { router, state }
    }

    /// Shared state handle, used by tests to tune the downstream at
    /// runtime.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/metrics", post(handlers::ingest_metric))
            .route("/api/metrics/summary", get(handlers::metrics_summary))
            .route("/api/metrics/list", get(handlers::list_metrics))
            .route("/api/breaker/status", get(handlers::breaker_status))
            .route("/api/external", get(handlers::call_external))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener until
    /// shutdown is triggered.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: ShutdownWatcher,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
