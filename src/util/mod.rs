//! Utility modules for pyrunner
//!
//! - Structured logging setup and configuration
//! - Shutdown signal handling

pub mod logging;
pub mod signals;

pub use logging::{init_logging, LoggingConfig};
