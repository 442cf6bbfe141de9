//! rrlb - a round-robin HTTP reverse-proxy load balancer
//!
//! Requests are spread over a fixed list of backends in round-robin order,
//! skipping backends that failed their last health probe:
//! - per-backend liveness behind its own read/write lock
//! - a lock-free selection cursor shared by all requests
//! - a background monitor that probes backends over TCP on a fixed interval
//! - a 503 whenever no backend is live or forwarding fails

pub mod backend;
pub mod config;
pub mod frontend;
pub mod health;
pub mod proxy;
pub mod util;

pub use config::Config;
