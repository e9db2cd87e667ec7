//! JSON exporter for finished runs.
//!
//! Captures the configuration, the hunger report and the tail of the
//! monitor's event log so a run can be inspected or replayed offline.

use crate::monitor::{MonitorSummary, TableMonitor, TimedEvent};

use dining_core::{HungerReport, SimulationConfig};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete run export.
#[derive(Debug, Clone, Serialize)]
pub struct SimExport {
    /// Scenario name, or "run" for a plain simulation
    pub scenario: String,

    /// Seed used (0 = entropy)
    pub seed: u64,

    /// Wall-clock duration in seconds
    pub duration_sec: f64,

    /// Table configuration
    pub config: SimulationConfig,

    /// Hunger statistics at stop
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<HungerReport>,

    /// Meals, event count and violations
    pub monitor: MonitorSummary,

    /// Retained tail of the event log
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<TimedEvent>,

    /// Final verdict
    pub passed: bool,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, config: SimulationConfig) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            config,
            report: None,
            monitor: MonitorSummary {
                meals: Vec::new(),
                total_events: 0,
                violations: Vec::new(),
            },
            events: Vec::new(),
            passed: false,
        }
    }

    /// Copies the monitor's summary and event log.
    pub fn capture(&mut self, monitor: &TableMonitor) {
        self.monitor = monitor.summary();
        self.events = monitor.events();
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, duration_sec: f64, report: Option<HungerReport>) {
        self.duration_sec = duration_sec;
        self.report = report;
        self.passed = self.monitor.violations.is_empty() && self.report.is_some();
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dining_env::{ForkId, Observer, PhilosopherId};
    use std::time::Duration;

    #[test]
    fn test_export_captures_monitor() {
        let monitor = TableMonitor::new(2);
        monitor.on_fork_taken(ForkId(0), PhilosopherId(0));
        monitor.on_fork_available(ForkId(0));

        let mut export = SimExport::new("run", 9, SimulationConfig::new(2));
        export.capture(&monitor);
        export.finalize(
            1.5,
            Some(HungerReport::from_hungry_times(&[Duration::from_millis(4), Duration::ZERO])),
        );

        assert!(export.passed);
        assert_eq!(export.events.len(), 2);
        assert_eq!(export.monitor.total_events, 2);
    }

    #[test]
    fn test_export_without_report_fails() {
        let mut export = SimExport::new("paired", 1, SimulationConfig::default());
        export.finalize(0.0, None);
        assert!(!export.passed);
    }

    #[test]
    fn test_write_to_file() {
        let path = std::env::temp_dir().join(format!("dining-export-{}.json", std::process::id()));
        let mut export = SimExport::new("run", 3, SimulationConfig::new(3));
        export.finalize(0.25, Some(HungerReport::from_hungry_times(&[Duration::ZERO; 3])));
        export.write_to_file(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(json["scenario"], "run");
        assert_eq!(json["config"]["num_philosophers"], 3);
        assert_eq!(json["report"]["philosophers"].as_array().unwrap().len(), 3);
        assert!(json.get("events").is_none());
    }
}
