//! Analytics Ingestion Gateway Library

pub mod config;
pub mod downstream;
pub mod http;
pub mod ingest;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod store;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
