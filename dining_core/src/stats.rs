//! Hunger statistics - fairness report produced when a run stops.

use crate::agent::AgentReport;

use dining_env::PhilosopherId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serializes durations as fractional milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_nanos() as f64 / 1_000_000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(d)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(serde::de::Error::custom(format!("invalid duration: {}ms", ms)));
        }
        Ok(Duration::from_nanos((ms * 1_000_000.0).round() as u64))
    }
}

/// Hunger tally of one philosopher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhilosopherHunger {
    pub id: PhilosopherId,
    #[serde(rename = "hungry_ms", with = "duration_ms")]
    pub hungry_time: Duration,
    pub meals: u64,
}

/// Per-philosopher hungry time with mean, extremes and spread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HungerReport {
    /// Sorted by philosopher id
    pub philosophers: Vec<PhilosopherHunger>,
    #[serde(rename = "total_ms", with = "duration_ms")]
    pub total: Duration,
    #[serde(rename = "mean_ms", with = "duration_ms")]
    pub mean: Duration,
    #[serde(rename = "min_ms", with = "duration_ms")]
    pub min: Duration,
    #[serde(rename = "max_ms", with = "duration_ms")]
    pub max: Duration,
    /// `max - min`
    #[serde(rename = "spread_ms", with = "duration_ms")]
    pub spread: Duration,
}

impl HungerReport {
    /// Aggregates the final reports of every agent.
    pub fn from_reports(reports: impl IntoIterator<Item = AgentReport>) -> Self {
        let mut philosophers: Vec<PhilosopherHunger> = reports
            .into_iter()
            .map(|r| PhilosopherHunger {
                id: r.id,
                hungry_time: r.hungry_time,
                meals: r.meals,
            })
            .collect();
        philosophers.sort_by_key(|p| p.id);
        Self::summarize(philosophers)
    }

    /// Aggregates bare hungry times; philosopher ids follow slice order.
    pub fn from_hungry_times(times: &[Duration]) -> Self {
        let philosophers = times
            .iter()
            .enumerate()
            .map(|(i, &hungry_time)| PhilosopherHunger {
                id: PhilosopherId(i),
                hungry_time,
                meals: 0,
            })
            .collect();
        Self::summarize(philosophers)
    }

    fn summarize(philosophers: Vec<PhilosopherHunger>) -> Self {
        let total: Duration = philosophers.iter().map(|p| p.hungry_time).sum();
        let min = philosophers
            .iter()
            .map(|p| p.hungry_time)
            .min()
            .unwrap_or_default();
        let max = philosophers
            .iter()
            .map(|p| p.hungry_time)
            .max()
            .unwrap_or_default();
        let mean = match philosophers.len() {
            0 => Duration::ZERO,
            n => total / n as u32,
        };

        Self {
            philosophers,
            total,
            mean,
            min,
            max,
            spread: max - min,
        }
    }

    /// Returns the total number of meals served.
    pub fn total_meals(&self) -> u64 {
        self.philosophers.iter().map(|p| p.meals).sum()
    }

    /// Returns philosophers that never ate.
    pub fn starved(&self) -> Vec<PhilosopherId> {
        self.philosophers
            .iter()
            .filter(|p| p.meals == 0)
            .map(|p| p.id)
            .collect()
    }
}

impl std::fmt::Display for HungerReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for p in &self.philosophers {
            writeln!(
                f,
                "Philosopher {} hungry time: {:.3} sec ({} meals)",
                p.id,
                p.hungry_time.as_secs_f64(),
                p.meals
            )?;
        }
        writeln!(f, "Average hungry time: {:.3} sec", self.mean.as_secs_f64())?;
        write!(f, "Spread of hungry time: {:.3} sec", self.spread.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_mean_and_spread() {
        let report = HungerReport::from_hungry_times(&[ms(10), ms(20), ms(30)]);
        assert_eq!(report.mean, ms(20));
        assert_eq!(report.spread, ms(20));
        assert_eq!(report.min, ms(10));
        assert_eq!(report.max, ms(30));
        assert_eq!(report.total, ms(60));
    }

    #[test]
    fn test_empty_report() {
        let report = HungerReport::from_hungry_times(&[]);
        assert_eq!(report.mean, Duration::ZERO);
        assert_eq!(report.spread, Duration::ZERO);
        assert!(report.philosophers.is_empty());
    }

    #[test]
    fn test_from_reports_sorts_and_counts() {
        let reports = vec![
            AgentReport { id: PhilosopherId(1), hungry_time: ms(5), meals: 2 },
            AgentReport { id: PhilosopherId(0), hungry_time: ms(15), meals: 0 },
        ];
        let report = HungerReport::from_reports(reports);

        assert_eq!(report.philosophers[0].id, PhilosopherId(0));
        assert_eq!(report.total_meals(), 2);
        assert_eq!(report.starved(), vec![PhilosopherId(0)]);
        assert_eq!(report.spread, ms(10));
    }

    #[test]
    fn test_display_lines() {
        let text = HungerReport::from_hungry_times(&[ms(1500), ms(500)]).to_string();
        assert!(text.contains("Philosopher #0 hungry time: 1.500 sec"));
        assert!(text.contains("Average hungry time: 1.000 sec"));
        assert!(text.ends_with("Spread of hungry time: 1.000 sec"));
    }

    #[test]
    fn test_json_uses_milliseconds() {
        let report = HungerReport::from_hungry_times(&[ms(10), ms(30)]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mean_ms"], 20.0);
        assert_eq!(json["spread_ms"], 20.0);
        assert_eq!(json["philosophers"][1]["hungry_ms"], 30.0);
    }

    proptest! {
        #[test]
        fn prop_mean_between_extremes(times in proptest::collection::vec(0u64..100_000, 1..32)) {
            let durations: Vec<Duration> = times.iter().map(|&t| ms(t)).collect();
            let report = HungerReport::from_hungry_times(&durations);
            prop_assert!(report.min <= report.mean);
            prop_assert!(report.mean <= report.max);
            prop_assert_eq!(report.spread, report.max - report.min);
        }
    }
}
