//! Structured logging setup
//!
//! `RUST_LOG` takes precedence over `logging.level`; `-v` flags raise the
//! configured level. Output goes to stderr, as JSON when `logging.json` is set.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::errors::{RagError, Result};

/// Filter directive for the configured level and verbosity count
pub fn filter_directive(config: &LoggingConfig, verbose: u8) -> String {
    match verbose {
        0 => config.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Build the env filter, preferring `RUST_LOG` when it is set
pub fn env_filter(config: &LoggingConfig, verbose: u8) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(filter_directive(config, verbose)).map_err(|e| {
            RagError::Configuration(format!("Invalid logging.level '{}': {}", config.level, e))
        }),
    }
}

/// Install the global subscriber; call once at process start
pub fn init_logging(config: &LoggingConfig, verbose: u8) -> Result<()> {
    let filter = env_filter(config, verbose)?;

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    installed.map_err(|e| RagError::Configuration(format!("Failed to initialise logging: {}", e)))
}
