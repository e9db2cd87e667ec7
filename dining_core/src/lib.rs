//! Dining Core - concurrent dining philosophers engine
//!
//! N philosophers sit at a round table with one fork between each pair of
//! neighbours. This library provides:
//! 1. **Fork arbitration**: three strategies behind one [`ResourceArbiter`]
//!    (naive left-then-right, atomic pair acquisition, fair queue)
//! 2. **Philosopher agents**: one thread per seat cycling think → hungry → eat
//!    with pause-aware, interruptible sleeps
//! 3. **Supervision**: start, pause, resume and stop a whole table and collect
//!    a [`HungerReport`] of how fairly the forks were shared

pub mod agent;
pub mod arbiter;
pub mod config;
pub mod control;
pub mod error;
pub mod stats;
pub mod supervisor;

// Re-export key types for convenience
pub use agent::{AgentReport, AgentStats, AgentStatus, PhilosopherAgent};
pub use arbiter::{Decision, ForkTable, LeftForkHook, ResourceArbiter, Strategy, TableSnapshot};
pub use config::{SimulationConfig, TimingRange};
pub use control::{AgentControl, CancelToken, SleepReport, Stopped};
pub use error::{AcquireError, DiningError};
pub use stats::{HungerReport, PhilosopherHunger};
pub use supervisor::Supervisor;
