//! Seeded context implementing DiningContext for reproducible runs.

use dining_env::DiningContext;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Simulation context backed by the monotonic clock and a seeded RNG.
///
/// This implements `DiningContext` using:
/// - `Instant` for hungry-time measurement (agents run on real threads)
/// - A ChaCha8 RNG seeded from the master seed for think/eat durations
///
/// The sequence of sampled durations is fixed by the seed. Which agent draws
/// which sample still depends on thread scheduling.
pub struct SeededContext {
    /// Master seed for this run
    seed: u64,

    /// Start time for monotonic duration calculations
    start: Instant,

    /// Deterministic RNG shared by all agents
    rng: Mutex<ChaCha8Rng>,
}

impl SeededContext {
    /// Creates a new SeededContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start: Instant::now(),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }
}

impl DiningContext for SeededContext {
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
        self.seed
    }
}
