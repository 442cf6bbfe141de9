//! Round-robin selection over a fixed set of backends.

use crate::backend::Backend;
use crate::config::{BackendConfig, ConfigError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// The ordered backend set plus the shared selection cursor.
///
/// The set never changes after construction, so an index always names the
/// same backend.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Backend>,
    /// Advanced once per selection attempt. Only its value modulo the set
    /// size matters, so wrapping is fine.
    current: AtomicU64,
}

impl BackendPool {
    /// Create a pool from already-built backends.
    pub fn new(backends: Vec<Backend>) -> Self {
        Self {
            backends,
            current: AtomicU64::new(0),
        }
    }

    /// Build a pool from configuration, keeping configured order.
    pub fn from_config(
        configs: &[BackendConfig],
        connect_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let backends = configs
            .iter()
            .map(|config| Backend::from_url(&config.url, connect_timeout))
            .collect::<Result<Vec<_>, _>>()?;

        if backends.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one backend must be defined".to_string(),
            ));
        }

        Ok(Self::new(backends))
    }

    /// Select the next live backend.
    ///
    /// Each call claims its own cursor value, so concurrent callers start
    /// their scans at different positions. The scan walks the whole ring
    /// from there and returns the first live backend, or `None` if every
    /// backend is down.
    pub fn next_backend(&self) -> Option<&Backend> {
        let count = self.backends.len();
        if count == 0 {
            return None;
        }

        let cursor = self.current.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let start = (cursor % count as u64) as usize;

        let selected = (0..count)
            .map(|offset| &self.backends[(start + offset) % count])
            .find(|backend| backend.is_alive());

        match selected {
            Some(backend) => debug!(backend = %backend, "selected backend"),
            None => warn!(backends = count, "no live backend available"),
        }

        selected
    }

    /// All backends in configured order.
    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    /// Number of backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether the pool has no backends.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Number of backends currently marked alive.
    pub fn live_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_alive()).count()
    }

    /// Total selection attempts so far.
    pub fn selections(&self) -> u64 {
        self.current.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;

    fn test_pool(count: usize) -> BackendPool {
        let configs: Vec<BackendConfig> = (0..count)
            .map(|i| BackendConfig::new(format!("http://127.0.0.1:{}", 9001 + i)))
            .collect();
        BackendPool::from_config(&configs, Duration::from_secs(1)).unwrap()
    }

    fn index_of(pool: &BackendPool, backend: &Backend) -> usize {
        pool.backends()
            .iter()
            .position(|b| std::ptr::eq(b, backend))
            .unwrap()
    }

    #[test]
    fn test_round_robin_cycles() {
        let pool = test_pool(3);

        let picks: Vec<usize> = (0..6)
            .map(|_| index_of(&pool, pool.next_backend().unwrap()))
            .collect();

        // The cursor is read after incrementing, so rotation starts at 1.
        assert_eq!(picks, vec![1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_full_cycle_visits_every_backend() {
        let pool = test_pool(5);

        for _ in 0..4 {
            let mut seen: Vec<usize> = (0..5)
                .map(|_| index_of(&pool, pool.next_backend().unwrap()))
                .collect();
            seen.sort_unstable();
            assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_sequential_fairness() {
        let pool = test_pool(3);
        let calls = 100;

        let mut counts = [0usize; 3];
        for _ in 0..calls {
            counts[index_of(&pool, pool.next_backend().unwrap())] += 1;
        }

        for count in counts {
            assert!(count == calls / 3 || count == calls.div_ceil(3));
        }
    }

    #[test]
    fn test_skips_dead_backend() {
        let pool = test_pool(3);
        pool.backends()[1].set_alive(false);

        let picks: Vec<usize> = (0..30)
            .map(|_| index_of(&pool, pool.next_backend().unwrap()))
            .collect();

        assert!(picks.iter().all(|&i| i == 0 || i == 2));
        assert!(picks.contains(&0));
        assert!(picks.contains(&2));
    }

    #[test]
    fn test_single_live_backend_always_chosen() {
        let pool = test_pool(4);
        for (i, backend) in pool.backends().iter().enumerate() {
            backend.set_alive(i == 2);
        }

        for _ in 0..20 {
            assert_eq!(index_of(&pool, pool.next_backend().unwrap()), 2);
        }
    }

    #[test]
    fn test_never_none_with_a_live_backend() {
        let pool = test_pool(4);

        // Try every single-live and multi-live combination.
        for mask in 1u32..16 {
            for (i, backend) in pool.backends().iter().enumerate() {
                backend.set_alive(mask & (1 << i) != 0);
            }
            for _ in 0..8 {
                let backend = pool.next_backend().unwrap();
                assert!(backend.is_alive());
            }
        }
    }

    #[test]
    fn test_all_dead_returns_none() {
        let pool = test_pool(3);
        for backend in pool.backends() {
            backend.set_alive(false);
        }

        for _ in 0..10 {
            assert!(pool.next_backend().is_none());
        }
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn test_empty_pool_returns_none() {
        let pool = BackendPool::new(Vec::new());
        assert!(pool.is_empty());
        assert!(pool.next_backend().is_none());
    }

    #[test]
    fn test_from_config_rejects_empty() {
        let result = BackendPool::from_config(&[], Duration::from_secs(1));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_from_config_rejects_malformed() {
        let configs = vec![
            BackendConfig::new("http://127.0.0.1:9001"),
            BackendConfig::new("127.0.0.1 9002"),
        ];
        assert!(BackendPool::from_config(&configs, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_cursor_wraps() {
        let pool = test_pool(3);
        pool.current.store(u64::MAX, Ordering::Relaxed);

        // u64::MAX + 1 wraps to 0.
        let backend = pool.next_backend().unwrap();
        assert_eq!(index_of(&pool, backend), 0);
        assert_eq!(pool.selections(), 0);
    }

    #[test]
    fn test_concurrent_selection_consumes_cursor_once_per_call() {
        let pool = Arc::new(test_pool(4));
        let threads = 8;
        let per_thread = 1000;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    let mut counts: HashMap<String, usize> = HashMap::new();
                    for _ in 0..per_thread {
                        let backend = pool.next_backend().unwrap();
                        *counts.entry(backend.address().to_string()).or_default() += 1;
                    }
                    counts
                })
            })
            .collect();

        let mut totals: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for (address, count) in handle.join().unwrap() {
                *totals.entry(address).or_default() += count;
            }
        }

        let calls = threads * per_thread;
        assert_eq!(pool.selections(), calls as u64);

        // Every cursor value was claimed exactly once, so the split is exact.
        assert_eq!(totals.len(), 4);
        for count in totals.values() {
            assert_eq!(*count, calls / 4);
        }
    }
}
