//! # Utility Modules
//!
//! Supporting utilities that sit beside the protocol core.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup from [`LoggingConfig`](crate::config::LoggingConfig)

pub mod logging;

pub use logging::init_logging;
