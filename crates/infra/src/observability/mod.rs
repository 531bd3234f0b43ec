//! Logging setup
//!
//! Installs the global `tracing` subscriber. `RUST_LOG` takes precedence over
//! the configured level so individual runs can raise verbosity without
//! editing config files.

use quire_domain::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Error returned when the subscriber can't be installed
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    #[error("invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("global subscriber already installed")]
    AlreadyInitialized,
}

/// Install a fmt subscriber filtered by `RUST_LOG` or `config.level`.
///
/// # Errors
/// Returns `ObservabilityError::InvalidFilter` for an unparsable level and
/// `ObservabilityError::AlreadyInitialized` if a global subscriber exists.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ObservabilityError> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = if config.json {
        builder.json().with_ansi(false).try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|_| ObservabilityError::AlreadyInitialized)
}

fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, ObservabilityError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| ObservabilityError::InvalidFilter {
        filter: config.level.clone(),
        message: e.to_string(),
    })
}
