//! PoolWatch Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other PoolWatch crates:
//! - Application configuration (server address, token, realtime tuning)
//! - Global error types covering all error categories
//! - Structured logging with tracing
//! - Platform detection utilities
//! - Common constants and type aliases

pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod constants;

// Re-export commonly used items at the crate root
pub use config::{AppConfig, RealtimeConfig};
pub use error::{PwError, PwResult};
pub use logging::init_logging;
pub use platform::Platform;
