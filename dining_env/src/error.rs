//! Configuration errors shared by the engine and its collaborators.

use thiserror::Error;

/// Invalid configuration or an Observer contract violation.
///
/// These are surfaced at the call site and never silently clamped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The ring needs at least two philosophers
    #[error("at least 2 philosophers are required, got {0}")]
    TooFewPhilosophers(usize),

    /// A timing range with `min > max`
    #[error("invalid {name} range: min {min_ms}ms exceeds max {max_ms}ms")]
    InvalidRange {
        name: &'static str,
        min_ms: u64,
        max_ms: u64,
    },

    /// Philosopher index outside `0..count`
    #[error("philosopher index {index} out of range for {count} philosophers")]
    PhilosopherOutOfRange { index: usize, count: usize },

    /// Fork index outside `0..count`
    #[error("fork index {index} out of range for {count} forks")]
    ForkOutOfRange { index: usize, count: usize },

    /// A philosopher tried to take a fork that is not beside its plate
    #[error("philosopher {phil} cannot take fork {fork}")]
    ForkNotAdjacent { fork: usize, phil: usize },

    /// Left and right fork are the same fork
    #[error("philosopher {phil} requested fork {fork} as both left and right")]
    DegenerateForkPair { phil: usize, fork: usize },

    /// An arbiter built for a different table size
    #[error("arbiter has {forks} forks but the table seats {philosophers}")]
    ForkCountMismatch { forks: usize, philosophers: usize },

    /// A run duration that is negative, not finite or too large
    #[error("invalid run duration: {0}")]
    InvalidDuration(String),

    /// A bounded run was requested without a run duration
    #[error("a bounded run needs a run duration")]
    MissingRunDuration,

    /// Unparseable strategy name
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    /// Unparseable or out-of-range philosopher state
    #[error("unknown philosopher state: {0}")]
    UnknownState(String),
}

impl ConfigError {
    /// Creates an invalid range error.
    pub fn range(name: &'static str, min_ms: u64, max_ms: u64) -> Self {
        Self::InvalidRange { name, min_ms, max_ms }
    }

    /// Creates an unknown state error.
    pub fn unknown_state(state: impl std::fmt::Display) -> Self {
        Self::UnknownState(state.to_string())
    }
}
