//! Production implementation of DiningContext using the system clock.

use crate::DiningContext;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Production context backed by the monotonic clock and OS entropy.
///
/// Durations sampled from this context are not reproducible; use a seeded
/// context when a run has to be replayed.
pub struct SystemContext {
    /// Start time for monotonic duration calculations
    start: Instant,

    /// Entropy-seeded RNG shared by all agents
    rng: Mutex<StdRng>,
}

impl SystemContext {
    /// Creates a new SystemContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Creates an Arc-wrapped context for sharing across threads.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for SystemContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DiningContext for SystemContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn sample_millis(&self, min_ms: u64, max_ms: u64) -> u64 {
        if min_ms >= max_ms {
            return min_ms;
        }
        self.rng.lock().gen_range(min_ms..=max_ms)
    }

    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_context_time() {
        let ctx = SystemContext::new();
        let t1 = ctx.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = ctx.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }

    #[test]
    fn test_sample_stays_in_range() {
        let ctx = SystemContext::new();
        for _ in 0..1000 {
            let ms = ctx.sample_millis(5, 9);
            assert!((5..=9).contains(&ms));
        }
        assert_eq!(ctx.sample_millis(7, 7), 7);
    }

    #[test]
    fn test_spawn_named_thread() {
        let ctx = SystemContext::new();
        let handle = ctx
            .spawn("philosopher-0", || {
                std::thread::current().name().map(str::to_string)
            })
            .unwrap();
        assert_eq!(handle.join().unwrap().as_deref(), Some("philosopher-0"));
    }

    #[test]
    fn test_system_context_seed() {
        let ctx = SystemContext::new();
        assert_eq!(ctx.seed(), 0);
    }
}
