//! Error types for the arbitration engine.

use dining_env::ConfigError;
use thiserror::Error;

/// Why `ResourceArbiter::acquire` returned without forks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    /// The caller's cancel token fired while it was blocked
    #[error("acquire cancelled")]
    Cancelled,

    /// The request named forks the philosopher may not take
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors surfaced by the supervisor and configuration loading.
#[derive(Debug, Error)]
pub enum DiningError {
    /// Rejected configuration (nothing was started)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Configuration file could not be read
    #[error("failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Configuration file is not valid JSON for `SimulationConfig`
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The OS refused to start a philosopher thread
    #[error("failed to spawn philosopher {phil}: {source}")]
    Spawn {
        phil: usize,
        source: std::io::Error,
    },

    /// Some agents did not exit before the stop deadline
    #[error("philosophers {pending:?} did not stop within {timeout_ms}ms")]
    StopTimeout { pending: Vec<usize>, timeout_ms: u64 },

    /// An agent thread panicked (an invariant violation)
    #[error("philosopher {0} panicked")]
    AgentPanicked(usize),
}

impl DiningError {
    /// Creates a spawn error.
    pub fn spawn(phil: usize, source: std::io::Error) -> Self {
        Self::Spawn { phil, source }
    }
}
