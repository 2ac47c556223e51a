//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! Client request:
//!     → server.rs (router, middleware: request-id, timeout, trace)
//!     → handlers.rs (validate, invoke the resilience core)
//!     → error.rs (map core outcomes to wire-level responses)
//! ```
//!
//! # Design Decisions
//! - Handlers stay thin: decisions live in the resilience layer, this
//!   layer only parses requests and maps outcomes
//! - Rate-limit denials and open circuits are deliberate outcomes, mapped
//!   to 429/fallback rather than treated as server errors

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, HttpServer};
