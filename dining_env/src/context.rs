//! Core environment context trait for philosopher agents.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that the arbiter, agents and
/// supervisor can run against the system clock in production and against a
/// seeded context in simulation runs.
///
/// # Implementations
///
/// - **Production**: `SystemContext` - `Instant` clock, entropy-seeded RNG
/// - **Simulation**: `SeededContext` (in `dining_sim`) - same clock, `ChaCha8Rng(seed)`
pub trait DiningContext: Send + Sync + 'static {
    /// Returns the monotonic time elapsed since context creation.
    ///
    /// Used to measure hungry time.
    fn now(&self) -> Duration;

    /// Samples a duration in milliseconds uniformly from `[min_ms, max_ms]`.
    ///
    /// Callers validate `min_ms <= max_ms`; a degenerate range returns `min_ms`.
    fn sample_millis(&self, min_ms: u64, max_ms: u64) -> u64;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// Entropy-seeded contexts return 0.
    fn seed(&self) -> u64;

    /// Spawns a named OS thread.
    ///
    /// Philosophers run on real threads so that arbitration is exercised under
    /// true parallelism.
    fn spawn<F, T>(&self, name: &str, f: F) -> io::Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        thread::Builder::new().name(name.to_string()).spawn(f)
    }
}
