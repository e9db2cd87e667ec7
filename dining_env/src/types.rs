//! Common types for the dining philosophers table.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Seat index of a philosopher at the table, `0..N-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhilosopherId(pub usize);

impl PhilosopherId {
    /// Returns the raw seat index.
    pub fn index(self) -> usize {
        self.0
    }

    /// The fork on the philosopher's left shares its index.
    pub fn left_fork(self) -> ForkId {
        ForkId(self.0)
    }

    /// The fork on the philosopher's right is the previous one around the ring.
    pub fn right_fork(self, count: usize) -> ForkId {
        ForkId((self.0 + count - 1) % count)
    }

    /// Checks the index against a table of `count` philosophers.
    pub fn check(self, count: usize) -> Result<Self, ConfigError> {
        if self.0 < count {
            Ok(self)
        } else {
            Err(ConfigError::PhilosopherOutOfRange { index: self.0, count })
        }
    }
}

impl std::fmt::Display for PhilosopherId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a fork on the table, `0..N-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForkId(pub usize);

impl ForkId {
    /// Returns the raw fork index.
    pub fn index(self) -> usize {
        self.0
    }

    /// The two philosophers allowed to hold this fork: `fork` and `(fork + 1) mod N`.
    pub fn neighbors(self, count: usize) -> (PhilosopherId, PhilosopherId) {
        (PhilosopherId(self.0), PhilosopherId((self.0 + 1) % count))
    }

    /// Checks the index against a table of `count` forks.
    pub fn check(self, count: usize) -> Result<Self, ConfigError> {
        if self.0 < count {
            Ok(self)
        } else {
            Err(ConfigError::ForkOutOfRange { index: self.0, count })
        }
    }
}

impl std::fmt::Display for ForkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical state of a philosopher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhilosopherState {
    Thinking,
    Hungry,
    Eating,
}

impl PhilosopherState {
    /// Returns the state name.
    pub fn name(&self) -> &'static str {
        match self {
            PhilosopherState::Thinking => "thinking",
            PhilosopherState::Hungry => "hungry",
            PhilosopherState::Eating => "eating",
        }
    }

    /// Returns the numeric state code (see `TryFrom<u8>`).
    pub fn code(&self) -> u8 {
        match self {
            PhilosopherState::Thinking => 0,
            PhilosopherState::Hungry => 1,
            PhilosopherState::Eating => 2,
        }
    }
}

impl std::fmt::Display for PhilosopherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PhilosopherState {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "thinking" => Ok(PhilosopherState::Thinking),
            "hungry" => Ok(PhilosopherState::Hungry),
            "eating" => Ok(PhilosopherState::Eating),
            _ => Err(ConfigError::unknown_state(s)),
        }
    }
}

/// Numeric state codes as used by display front-ends: 0 thinking, 1 hungry, 2 eating.
impl TryFrom<u8> for PhilosopherState {
    type Error = ConfigError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(PhilosopherState::Thinking),
            1 => Ok(PhilosopherState::Hungry),
            2 => Ok(PhilosopherState::Eating),
            other => Err(ConfigError::unknown_state(other)),
        }
    }
}
