//! Configuration loading, parsing, and validation.

mod loader;
mod types;
mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use types::*;
pub use validation::{
    parse_backend_url, validate_config, validate_log_level, BackendTarget, LOG_LEVELS,
};
