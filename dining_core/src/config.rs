//! Simulation configuration.
//!
//! Produced by the launch surface (CLI flags or a JSON file) and consumed by
//! the supervisor. Validation happens before any thread starts.

use crate::arbiter::Strategy;
use crate::error::DiningError;

use dining_env::{ConfigError, DiningContext};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Inclusive range of milliseconds a phase may last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl TimingRange {
    /// Creates a validated range; `name` labels the error.
    pub fn new(name: &'static str, min_ms: u64, max_ms: u64) -> Result<Self, ConfigError> {
        let range = Self { min_ms, max_ms };
        range.validate(name)?;
        Ok(range)
    }

    /// A range that always samples `ms`.
    pub fn fixed(ms: u64) -> Self {
        Self { min_ms: ms, max_ms: ms }
    }

    /// Rejects `min > max`.
    pub fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.min_ms > self.max_ms {
            return Err(ConfigError::range(name, self.min_ms, self.max_ms));
        }
        Ok(())
    }

    /// Samples a duration uniformly from the range.
    pub fn sample<Ctx: DiningContext + ?Sized>(&self, ctx: &Ctx) -> Duration {
        Duration::from_millis(ctx.sample_millis(self.min_ms, self.max_ms))
    }
}

impl Default for TimingRange {
    fn default() -> Self {
        // One to two seconds, the classic table setting
        Self {
            min_ms: 1000,
            max_ms: 2000,
        }
    }
}

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of philosophers (and forks); at least 2
    pub num_philosophers: usize,

    /// Fork arbitration policy
    pub strategy: Strategy,

    /// Thinking phase duration
    pub think: TimingRange,

    /// Eating phase duration
    pub eat: TimingRange,

    /// Length of a bounded run (None = until stopped)
    pub run_duration_ms: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_philosophers: 5,
            strategy: Strategy::default(),
            think: TimingRange::default(),
            eat: TimingRange::default(),
            run_duration_ms: None,
        }
    }
}

impl SimulationConfig {
    /// Creates a default configuration for `num_philosophers` seats.
    pub fn new(num_philosophers: usize) -> Self {
        Self {
            num_philosophers,
            ..Default::default()
        }
    }

    /// Sets the arbitration strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the thinking range in milliseconds.
    pub fn with_think(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.think = TimingRange { min_ms, max_ms };
        self
    }

    /// Sets the eating range in milliseconds.
    pub fn with_eat(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.eat = TimingRange { min_ms, max_ms };
        self
    }

    /// Sets the bounded run duration.
    pub fn with_run_duration(mut self, duration: Duration) -> Self {
        self.run_duration_ms = Some(duration.as_millis() as u64);
        self
    }

    /// Returns the bounded run duration, if any.
    pub fn run_duration(&self) -> Option<Duration> {
        self.run_duration_ms.map(Duration::from_millis)
    }

    /// Checks every field; nothing is clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_philosophers < 2 {
            return Err(ConfigError::TooFewPhilosophers(self.num_philosophers));
        }
        self.think.validate("think")?;
        self.eat.validate("eat")?;
        Ok(())
    }

    /// Parses and validates a JSON configuration.
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, DiningError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DiningError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dining_env::SystemContext;

    #[test]
    fn test_config_default() {
        let config = SimulationConfig::default();
        assert_eq!(config.num_philosophers, 5);
        assert_eq!(config.strategy, Strategy::Paired);
        assert_eq!(config.think, TimingRange { min_ms: 1000, max_ms: 2000 });
        assert_eq!(config.run_duration(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_single_philosopher() {
        let config = SimulationConfig::new(1);
        assert_eq!(config.validate(), Err(ConfigError::TooFewPhilosophers(1)));
    }

    #[test]
    fn test_rejects_inverted_range() {
        let config = SimulationConfig::new(3).with_eat(50, 10);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidRange { name: "eat", min_ms: 50, max_ms: 10 })
        );
        assert!(TimingRange::new("think", 9, 3).is_err());
    }

    #[test]
    fn test_zero_range_is_valid() {
        let config = SimulationConfig::new(2).with_think(0, 0).with_eat(0, 0);
        assert!(config.validate().is_ok());
        assert_eq!(config.think.sample(&SystemContext::new()), Duration::ZERO);
    }

    #[test]
    fn test_from_json_partial() {
        let config = SimulationConfig::from_json_str(
            r#"{ "num_philosophers": 7, "strategy": "fair", "eat": { "min_ms": 5, "max_ms": 10 } }"#,
        )
        .unwrap();
        assert_eq!(config.num_philosophers, 7);
        assert_eq!(config.strategy, Strategy::Fair);
        assert_eq!(config.eat, TimingRange { min_ms: 5, max_ms: 10 });
        assert_eq!(config.think, TimingRange::default());
    }

    #[test]
    fn test_from_json_validates() {
        let err = SimulationConfig::from_json_str(r#"{ "num_philosophers": 1 }"#).unwrap_err();
        assert!(matches!(err, DiningError::Config(ConfigError::TooFewPhilosophers(1))));

        let err = SimulationConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, DiningError::ConfigParse(_)));
    }
}
