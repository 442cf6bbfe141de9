//! Configuration data types.

use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub global: GlobalConfig,

    /// Address and port the balancer listens on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Active health check settings
    #[serde(default)]
    pub health_check: HealthCheckConfig,

    /// Forwarding settings
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Upstream servers, in round-robin order
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

/// Global configuration settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: json, pretty or compact
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}

/// Active health check settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckConfig {
    /// How often to probe backends
    #[serde(default = "default_health_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Timeout for a single TCP probe
    #[serde(default = "default_health_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval: default_health_interval(),
            timeout: default_health_timeout(),
        }
    }
}

/// Forwarding settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Timeout for establishing a connection to a backend
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Individual backend configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Backend URL, e.g. `http://localhost:8081`
    pub url: String,
}

impl BackendConfig {
    /// Create a backend entry from a URL string.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

// Default value functions
fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_health_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_health_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Deserialize humantime durations such as `30s` or `1m 30s`.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_yaml() {
        let config: Config = serde_yaml::from_str("backends: []").unwrap();

        assert_eq!(config.global.log_level, "info");
        assert_eq!(config.global.log_format, LogFormat::Pretty);
        assert_eq!(config.listen, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.health_check.interval, Duration::from_secs(60));
        assert_eq!(config.health_check.timeout, Duration::from_secs(2));
        assert_eq!(config.proxy.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_humantime_durations() {
        let yaml = r#"
health_check:
  interval: 15s
  timeout: 500ms
proxy:
  connect_timeout: 1m 30s
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.health_check.interval, Duration::from_secs(15));
        assert_eq!(config.health_check.timeout, Duration::from_millis(500));
        assert_eq!(config.proxy.connect_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_log_format_serde() {
        let format: LogFormat = serde_yaml::from_str("json").unwrap();
        assert_eq!(format, LogFormat::Json);

        let format: LogFormat = serde_yaml::from_str("compact").unwrap();
        assert_eq!(format, LogFormat::Compact);

        assert!(serde_yaml::from_str::<LogFormat>("xml").is_err());
    }
}
