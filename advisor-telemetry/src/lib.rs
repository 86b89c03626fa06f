//! Log output for the kiln advisor.
//!
//! Installs a `tracing-subscriber` formatter whose filter comes from
//! `RUST_LOG` when set and from [`LoggingConfig::filter`] otherwise. Log
//! lines go to stderr so stdout stays free for command output.

#![warn(missing_docs, clippy::pedantic)]

use advisor_config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already installed.
    #[error("tracing subscriber already installed: {reason}")]
    AlreadyInstalled {
        /// Message reported by `tracing-subscriber`.
        reason: String,
    },
}

/// Result alias for telemetry setup.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Builds the filter: `RUST_LOG`, then `fallback`, then plain `info`.
#[must_use]
pub fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global `fmt` subscriber described by `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::AlreadyInstalled`] if another subscriber is
/// already active.
pub fn init_tracing(config: &LoggingConfig) -> TelemetryResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.filter))
        .with_target(config.with_target)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| TelemetryError::AlreadyInstalled {
            reason: err.to_string(),
        })?;
    tracing::debug!(filter = %config.filter, "tracing initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_directive_falls_back_to_info() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert_eq!(env_filter("debug").to_string(), "debug");
        assert_eq!(env_filter("advisor=loud").to_string(), "info");
    }

    #[test]
    fn second_install_is_reported() {
        let config = LoggingConfig::default();
        let _ = init_tracing(&config);
        assert!(matches!(
            init_tracing(&config),
            Err(TelemetryError::AlreadyInstalled { .. })
        ));
    }
}
