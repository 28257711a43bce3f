//! Subscriber setup for the crate's `tracing` events.
//!
//! The core only emits events; installing a subscriber is the embedding
//! server's choice. [`init_logging`] is a ready-made one driven by
//! [`LoggingConfig`]. `RUST_LOG`, when set, overrides the configured level.

use crate::config::LoggingConfig;
use crate::error::{LdapError, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install a global subscriber; fails if one is already installed
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_ascii_lowercase()));

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.log_to_console {
        let layer = fmt::layer().with_writer(std::io::stderr);
        layers.push(if config.json_format {
            layer.json().boxed()
        } else {
            layer.boxed()
        });
    }

    if config.log_to_file {
        let path = config.log_file_path.as_deref().ok_or_else(|| {
            LdapError::Config("log_file_path must be specified when log_to_file is true".into())
        })?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
        layers.push(if config.json_format {
            layer.json().boxed()
        } else {
            layer.boxed()
        });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| LdapError::Config(format!("failed to install log subscriber: {e}")))?;

    debug!(app = %config.app_name, level = %config.log_level, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging() {
        let missing_path = LoggingConfig {
            log_to_file: true,
            log_file_path: None,
            ..LoggingConfig::default()
        };
        assert!(matches!(init_logging(&missing_path), Err(LdapError::Config(_))));

        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        // only one global subscriber
        assert!(matches!(init_logging(&config), Err(LdapError::Config(_))));
    }
}
