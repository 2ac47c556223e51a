//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! --config path → loader.rs (read + TOML parse)
//!               → validation.rs (semantic checks, all errors reported)
//!               → GatewayConfig consumed by startup
//! ```

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::GatewayConfig;
