//! Active health checking for backend servers.

mod monitor;
mod prober;

pub use monitor::HealthMonitor;
pub use prober::{probe, ProbeError};
