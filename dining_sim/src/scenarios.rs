//! Verification scenarios for the arbitration engine.

use dining_core::Strategy;
use serde::Serialize;
use thiserror::Error;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// DP-001: Paired strategy, every philosopher eats, no violations
    Paired,

    /// DP-002: Fair strategy, every philosopher eats, bounded spread
    Fair,

    /// DP-003: Independent strategy forced into the circular wait
    Deadlock,

    /// DP-004: Global pause freezes meals; resume restarts them
    PauseResume,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Paired,
            ScenarioId::Fair,
            ScenarioId::Deadlock,
            ScenarioId::PauseResume,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Paired => "paired",
            ScenarioId::Fair => "fair",
            ScenarioId::Deadlock => "deadlock",
            ScenarioId::PauseResume => "pause_resume",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Paired => "Atomic pair acquisition: mutual exclusion and progress",
            ScenarioId::Fair => "Fair queue: mutual exclusion, progress for every seat",
            ScenarioId::Deadlock => "Naive left-then-right: everyone holds one fork, nobody eats",
            ScenarioId::PauseResume => "Pause the whole table, check it is frozen, resume",
        }
    }

    /// Strategy the scenario runs the table with.
    pub fn strategy(&self) -> Strategy {
        match self {
            ScenarioId::Paired | ScenarioId::PauseResume => Strategy::Paired,
            ScenarioId::Fair => Strategy::Fair,
            ScenarioId::Deadlock => Strategy::Independent,
        }
    }
}

/// A scenario name that matches no known scenario.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioError {
    #[error("Unknown scenario: {0}")]
    Unknown(String),
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paired" | "dp-001" => Ok(ScenarioId::Paired),
            "fair" | "dp-002" => Ok(ScenarioId::Fair),
            "deadlock" | "dp-003" => Ok(ScenarioId::Deadlock),
            "pause_resume" | "pauseresume" | "pause" | "dp-004" => Ok(ScenarioId::PauseResume),
            _ => Err(ScenarioError::Unknown(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert_eq!("DP-003".parse::<ScenarioId>(), Ok(ScenarioId::Deadlock));
        assert_eq!(
            "split_brain".parse::<ScenarioId>(),
            Err(ScenarioError::Unknown("split_brain".to_string()))
        );
        assert_eq!(
            ScenarioError::Unknown("split_brain".to_string()).to_string(),
            "Unknown scenario: split_brain"
        );
    }

    #[test]
    fn test_only_deadlock_uses_independent() {
        for scenario in ScenarioId::all() {
            assert_eq!(
                scenario.strategy() == Strategy::Independent,
                scenario == ScenarioId::Deadlock
            );
        }
    }
}
