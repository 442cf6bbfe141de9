//! A single upstream server and its liveness.

use crate::config::{parse_backend_url, ConfigError};
use crate::proxy::Forwarder;
use hyper::Uri;
use parking_lot::RwLock;
use std::fmt;
use std::time::Duration;

/// An upstream server.
///
/// The liveness flag has its own lock, so probing one backend never
/// contends with readers of another.
#[derive(Debug)]
pub struct Backend {
    /// URL as configured.
    url: Uri,
    /// `host:port` used for probing and forwarding.
    address: String,
    /// Whether the last probe reached the backend. Starts out `true`.
    alive: RwLock<bool>,
    /// Forwarding handle bound to `address`.
    forwarder: Forwarder,
}

impl Backend {
    /// Create a backend that is considered alive until probed.
    ///
    /// Any path or query in `url` is carried onto every forwarded request.
    pub fn new(url: Uri, address: impl Into<String>, connect_timeout: Duration) -> Self {
        let address = address.into();
        Self {
            forwarder: Forwarder::new(address.clone(), connect_timeout).with_base(&url),
            url,
            address,
            alive: RwLock::new(true),
        }
    }

    /// Create a backend from a configured URL such as `http://localhost:8081`.
    pub fn from_url(raw: &str, connect_timeout: Duration) -> Result<Self, ConfigError> {
        let target = parse_backend_url(raw).map_err(ConfigError::ValidationError)?;
        Ok(Self::new(target.url, target.address, connect_timeout))
    }

    /// The configured URL.
    pub fn url(&self) -> &Uri {
        &self.url
    }

    /// The `host:port` this backend lives at.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The forwarder bound to this backend.
    pub fn forwarder(&self) -> &Forwarder {
        &self.forwarder
    }

    /// Record the outcome of a probe.
    pub fn set_alive(&self, alive: bool) {
        *self.alive.write() = alive;
    }

    /// Whether the backend accepted its last probe.
    pub fn is_alive(&self) -> bool {
        *self.alive.read()
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn backend() -> Backend {
        Backend::from_url("http://127.0.0.1:9001", Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_backend_starts_alive() {
        assert!(backend().is_alive());
    }

    #[test]
    fn test_set_alive() {
        let backend = backend();

        backend.set_alive(false);
        assert!(!backend.is_alive());

        backend.set_alive(true);
        assert!(backend.is_alive());
    }

    #[test]
    fn test_address_and_forwarder_agree() {
        let backend = backend();
        assert_eq!(backend.address(), "127.0.0.1:9001");
        assert_eq!(backend.forwarder().address(), backend.address());
    }

    #[test]
    fn test_url_keeps_base_path() {
        let backend = Backend::from_url("http://127.0.0.1:9001/api/v1", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.url().path(), "/api/v1");
        assert_eq!(backend.address(), "127.0.0.1:9001");
    }

    #[test]
    fn test_from_url_rejects_malformed() {
        let result = Backend::from_url("https://127.0.0.1:9001", Duration::from_secs(1));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let backend = Arc::new(backend());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let backend = Arc::clone(&backend);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        backend.set_alive(i % 2 == 0);
                        let _ = backend.is_alive();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        backend.set_alive(false);
        assert!(!backend.is_alive());
    }
}
