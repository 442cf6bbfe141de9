//! TCP reachability probe.

use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::warn;

/// Why a probe did not reach its backend.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("connection failed: {0}")]
    Connect(#[from] std::io::Error),

    #[error("connection timeout after {0:?}")]
    Timeout(Duration),
}

/// Check whether `address` (`host:port`) accepts a TCP connection within
/// `probe_timeout`.
///
/// An unreachable backend is an expected outcome, so the reason is only
/// logged. The connection is closed as soon as it is established.
pub async fn probe(address: &str, probe_timeout: Duration) -> bool {
    match connect(address, probe_timeout).await {
        Ok(()) => true,
        Err(e) => {
            warn!(backend = address, error = %e, "backend unreachable");
            false
        }
    }
}

async fn connect(address: &str, probe_timeout: Duration) -> Result<(), ProbeError> {
    match timeout(probe_timeout, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(ProbeError::Connect(e)),
        Err(_) => Err(ProbeError::Timeout(probe_timeout)),
    }
}
