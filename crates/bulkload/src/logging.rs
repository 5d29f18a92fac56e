//! Subscriber setup for binaries and tests embedding the importer.
//!
//! Library code logs through `tracing` (pipeline) and `log` (leaf modules);
//! `init` installs one subscriber for both.

use std::str::FromStr;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ConfigError;

/// Installs the global subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// when a global subscriber was already installed, leaving it untouched.
pub fn init(config: &LoggingConfig) -> Result<bool, ConfigError> {
    let level = tracing::Level::from_str(&config.level).map_err(|_| ConfigError::Validation {
        message: format!("Invalid log level: {}", config.level),
    })?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Pretty => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().with_thread_names(true)))
        }
        LogFormat::Json => tracing::subscriber::set_global_default(registry.with(fmt::layer().json())),
    };

    if installed.is_err() {
        return Ok(false);
    }

    // Route `log` records from the worker and db modules into tracing.
    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::debug!("log bridge not installed: {}", e);
    }

    Ok(true)
}
