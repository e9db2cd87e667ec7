//! Dining Philosophers simulation harness
//!
//! This crate runs the `dining_core` engine on real threads and checks it
//! from the outside:
//! - **Randomness**: think/eat durations drawn from a single 64-bit seed
//! - **Verification**: a [`TableMonitor`] Observer replays every fork and
//!   state event against its own copy of the table
//! - **Scenarios**: named runs (`paired`, `fair`, `deadlock`, `pause_resume`)
//!   with pass/fail verdicts
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    ScenarioRunner                    │
//! │  ┌───────────────┐        ┌───────────────────────┐  │
//! │  │ SeededContext │───────►│      Supervisor       │  │
//! │  │ (ChaCha8Rng)  │        │  agents + arbiter     │  │
//! │  └───────────────┘        └──────────┬────────────┘  │
//! │                                      │ Observer      │
//! │                           ┌──────────▼────────────┐  │
//! │                           │     TableMonitor      │  │
//! │                           │ (invariant oracle)    │  │
//! │                           └───────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use dining_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 5).run(ScenarioId::Fair);
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod monitor;
mod runner;
pub mod scenarios;

pub use context::SeededContext;
pub use exporter::SimExport;
pub use monitor::{MonitorSummary, TableEvent, TableMonitor, TimedEvent, Violation};
pub use runner::{ScenarioResult, ScenarioRunner};
