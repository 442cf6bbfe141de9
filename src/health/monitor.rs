//! Periodic health monitor.
//!
//! Probes every backend in the pool and records the outcome on the backend
//! itself. The request path only ever sees the resulting liveness flags.

use crate::backend::BackendPool;
use crate::config::HealthCheckConfig;
use crate::health::probe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Keeps backend liveness current.
pub struct HealthMonitor {
    /// Backends to probe.
    pool: Arc<BackendPool>,
    /// Time between rounds.
    interval: Duration,
    /// Per-probe timeout.
    timeout: Duration,
}

impl HealthMonitor {
    /// Create a new health monitor.
    pub fn new(pool: Arc<BackendPool>, config: &HealthCheckConfig) -> Self {
        Self {
            pool,
            interval: config.interval,
            timeout: config.timeout,
        }
    }

    /// Probe every backend once, in order, and update its liveness.
    pub async fn run_once(&self) {
        for backend in self.pool.backends() {
            let alive = probe(backend.address(), self.timeout).await;
            backend.set_alive(alive);

            if alive {
                info!(backend = %backend, "backend is alive");
            } else {
                warn!(backend = %backend, "backend is down");
            }
        }

        debug!(
            live = self.pool.live_count(),
            total = self.pool.len(),
            "health check round complete"
        );
    }

    /// Repeat [`run_once`](Self::run_once) every interval until shutdown.
    ///
    /// The first round runs one interval after start; callers are expected
    /// to have run the startup check already.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(interval = ?self.interval, "health monitor starting");

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }

                _ = shutdown.recv() => {
                    info!("health monitor shutting down");
                    break;
                }
            }
        }
    }
}
