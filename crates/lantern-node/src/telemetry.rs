//! Tracing subscriber installation.
//!
//! `RUST_LOG` wins over the configured level. Output is human-readable or
//! JSON lines depending on [`LoggingConfig::json`].

use std::sync::OnceLock;

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Tracing initialisation errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Neither `RUST_LOG` nor the configured level is a valid filter.
    #[error("invalid log filter {level:?}: {reason}")]
    InvalidFilter { level: String, reason: String },
}

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Install the global subscriber. Later calls are no-ops.
///
/// A subscriber installed elsewhere (a test harness, an embedding binary) is
/// left in place.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TelemetryError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| TelemetryError::InvalidFilter {
            level: config.level.clone(),
            reason: e.to_string(),
        })?;

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    let _ = INSTALLED.set(());
    match installed {
        Ok(()) => tracing::info!(level = %config.level, json = config.json, "Tracing initialised"),
        Err(e) => tracing::debug!(error = %e, "Keeping existing global subscriber"),
    }
    Ok(())
}
