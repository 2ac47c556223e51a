//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Connect store → Bind listener → Serve
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C or trigger() → watch flips → server drains and exits
//! ```

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownWatcher};
