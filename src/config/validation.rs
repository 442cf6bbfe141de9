//! Configuration validation.

use crate::config::Config;
use hyper::Uri;
use std::collections::HashSet;
use std::time::Duration;

/// Port used when a backend URL does not name one.
const DEFAULT_HTTP_PORT: u16 = 80;

/// Log levels accepted in configuration and on the command line.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A backend URL broken down into what the balancer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    /// The URL as configured.
    pub url: Uri,
    /// `host:port` to connect to.
    pub address: String,
}

impl BackendTarget {
    /// Address plus path and query. Two backends with the same key are the
    /// same target.
    pub fn key(&self) -> String {
        let path_and_query = self
            .url
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        format!("{}{}", self.address, path_and_query)
    }
}

/// Parse a backend URL.
///
/// Only plain `http` URLs with a host are accepted. The port defaults to 80.
/// A path or query is kept and prefixed onto forwarded requests.
pub fn parse_backend_url(raw: &str) -> Result<BackendTarget, String> {
    let url: Uri = raw
        .parse()
        .map_err(|e| format!("invalid backend URL '{}': {}", raw, e))?;

    match url.scheme_str() {
        Some("http") => {}
        Some(other) => {
            return Err(format!(
                "backend URL '{}' uses unsupported scheme '{}' (only http)",
                raw, other
            ));
        }
        None => return Err(format!("backend URL '{}' has no scheme", raw)),
    }

    let host = match url.host() {
        Some(host) if !host.is_empty() => host,
        _ => return Err(format!("backend URL '{}' has no host", raw)),
    };

    let port = url.port_u16().unwrap_or(DEFAULT_HTTP_PORT);
    let address = format!("{}:{}", host, port);

    Ok(BackendTarget { url, address })
}

/// Validate the configuration.
///
/// Checks for:
/// - At least one backend
/// - Backend URLs that parse as `http://host[:port][/path]`
/// - No two backends pointing at the same target
/// - Non-zero health check and connect timings
/// - A known log level
///
/// # Returns
///
/// `Ok(())` if valid, or an error message listing every problem found.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push("at least one backend must be defined".to_string());
    }

    let mut targets = HashSet::new();
    for backend in &config.backends {
        match parse_backend_url(&backend.url) {
            Ok(target) => {
                if !targets.insert(target.key()) {
                    errors.push(format!("duplicate backend: {}", backend.url));
                }
            }
            Err(e) => errors.push(e),
        }
    }

    check_non_zero(
        &mut errors,
        "health_check.interval",
        config.health_check.interval,
    );
    check_non_zero(&mut errors, "health_check.timeout", config.health_check.timeout);
    check_non_zero(
        &mut errors,
        "proxy.connect_timeout",
        config.proxy.connect_timeout,
    );

    if let Err(e) = validate_log_level(&config.global.log_level) {
        errors.push(e);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

/// Check that `level` is one of [`LOG_LEVELS`], ignoring case.
pub fn validate_log_level(level: &str) -> Result<(), String> {
    if LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(format!(
            "invalid log level '{}', must be one of: {}",
            level,
            LOG_LEVELS.join(", ")
        ))
    }
}

fn check_non_zero(errors: &mut Vec<String>, field: &str, value: Duration) {
    if value.is_zero() {
        errors.push(format!("{} must be greater than zero", field));
    }
}
