//! Logging initialization.

use crate::config::{validate_log_level, LogFormat};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging could not be set up.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("{0}")]
    UnknownLevel(String),

    #[error("invalid log filter '{0}': {1}")]
    InvalidFilter(String, #[source] tracing_subscriber::filter::ParseError),

    #[error("a global logger is already installed: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global tracing subscriber.
///
/// `level` must be one of the known log levels. `RUST_LOG`, when set, takes
/// precedence over it.
pub fn init_logging(level: &str, format: &LogFormat) -> Result<(), LoggingError> {
    validate_log_level(level).map_err(LoggingError::UnknownLevel)?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(level)?,
    };

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init()?,
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init()?,
    }

    Ok(())
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(level.to_lowercase())
        .map_err(|e| LoggingError::InvalidFilter(level.to_string(), e))
}
