//! Table monitor - invariant oracle fed by Observer notifications.
//!
//! The monitor keeps its own "ground truth" copy of the table built only
//! from events:
//! - Who holds each fork
//! - What state each philosopher last reported
//! - How many times each philosopher started eating
//!
//! Every event is checked against that copy; broken invariants are recorded
//! as [`Violation`]s instead of panicking so a scenario can report them.

use dining_env::{
    validate_fork_taken, ForkId, Observer, PhilosopherId, PhilosopherState,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Default number of events kept in the log.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// A single Observer notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableEvent {
    State { phil: PhilosopherId, state: PhilosopherState },
    ForkTaken { fork: ForkId, phil: PhilosopherId },
    ForkAvailable { fork: ForkId },
}

/// An event with its offset from monitor creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimedEvent {
    pub at_ms: f64,
    #[serde(flatten)]
    pub event: TableEvent,
}

/// A broken table invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// A fork was taken while someone else held it
    DoubleHeld {
        fork: ForkId,
        holder: PhilosopherId,
        taker: PhilosopherId,
    },
    /// The taker does not sit next to the fork, or an index is out of range
    BadForkTaken { fork: ForkId, phil: PhilosopherId, reason: String },
    /// A free fork was reported available again
    ReleasedFree { fork: ForkId },
    /// A philosopher started eating without holding both forks
    EatingWithoutForks { phil: PhilosopherId },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Violation::DoubleHeld { fork, holder, taker } => write!(
                f,
                "fork {} taken by philosopher {} while held by {}",
                fork, taker, holder
            ),
            Violation::BadForkTaken { fork, phil, reason } => {
                write!(f, "fork {} taken by philosopher {}: {}", fork, phil, reason)
            }
            Violation::ReleasedFree { fork } => write!(f, "fork {} released while free", fork),
            Violation::EatingWithoutForks { phil } => {
                write!(f, "philosopher {} eating without both forks", phil)
            }
        }
    }
}

/// Aggregated monitor state for reports and exports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSummary {
    pub meals: Vec<u64>,
    pub total_events: u64,
    pub violations: Vec<Violation>,
}

struct MonitorState {
    holders: Vec<Option<PhilosopherId>>,
    states: Vec<PhilosopherState>,
    meals: Vec<u64>,
    violations: Vec<Violation>,
    events: VecDeque<TimedEvent>,
    total_events: u64,
}

/// Observer that mirrors the table and checks every invariant it can see.
pub struct TableMonitor {
    count: usize,
    capacity: usize,
    started: Instant,
    state: Mutex<MonitorState>,
}

impl TableMonitor {
    /// Creates a monitor for `count` seats with the default event capacity.
    pub fn new(count: usize) -> Self {
        Self::with_capacity(count, DEFAULT_EVENT_CAPACITY)
    }

    /// Creates a monitor that keeps at most `capacity` recent events.
    pub fn with_capacity(count: usize, capacity: usize) -> Self {
        Self {
            count,
            capacity,
            started: Instant::now(),
            state: Mutex::new(MonitorState {
                holders: vec![None; count],
                states: vec![PhilosopherState::Thinking; count],
                meals: vec![0; count],
                violations: Vec::new(),
                events: VecDeque::with_capacity(capacity.min(DEFAULT_EVENT_CAPACITY)),
                total_events: 0,
            }),
        }
    }

    /// Returns the number of seats being watched.
    pub fn philosopher_count(&self) -> usize {
        self.count
    }

    /// Returns true if no violation has been recorded.
    pub fn is_clean(&self) -> bool {
        self.state.lock().violations.is_empty()
    }

    /// Returns every recorded violation.
    pub fn violations(&self) -> Vec<Violation> {
        self.state.lock().violations.clone()
    }

    /// Returns Hungry → Eating transitions per philosopher.
    pub fn meals(&self) -> Vec<u64> {
        self.state.lock().meals.clone()
    }

    /// Returns the last reported state per philosopher.
    pub fn states(&self) -> Vec<PhilosopherState> {
        self.state.lock().states.clone()
    }

    /// Returns fork holders as seen through events.
    pub fn holders(&self) -> Vec<Option<PhilosopherId>> {
        self.state.lock().holders.clone()
    }

    /// Returns the retained tail of the event log, oldest first.
    pub fn events(&self) -> Vec<TimedEvent> {
        self.state.lock().events.iter().copied().collect()
    }

    /// Returns the number of events seen, including evicted ones.
    pub fn total_events(&self) -> u64 {
        self.state.lock().total_events
    }

    /// Returns meals, event count and violations in one consistent read.
    pub fn summary(&self) -> MonitorSummary {
        let state = self.state.lock();
        MonitorSummary {
            meals: state.meals.clone(),
            total_events: state.total_events,
            violations: state.violations.clone(),
        }
    }

    fn record(&self, state: &mut MonitorState, event: TableEvent) {
        state.total_events += 1;
        if self.capacity == 0 {
            return;
        }
        if state.events.len() == self.capacity {
            state.events.pop_front();
        }
        state.events.push_back(TimedEvent {
            at_ms: self.started.elapsed().as_secs_f64() * 1000.0,
            event,
        });
    }

    fn violate(state: &mut MonitorState, violation: Violation) {
        warn!(%violation, "table invariant violated");
        state.violations.push(violation);
    }
}

impl Observer for TableMonitor {
    fn on_state_change(&self, phil: PhilosopherId, new_state: PhilosopherState) {
        let mut state = self.state.lock();
        self.record(&mut state, TableEvent::State { phil, state: new_state });
        trace!(phil = phil.0, state = %new_state, "state change");

        let Some(slot) = state.states.get_mut(phil.0) else {
            return;
        };
        *slot = new_state;

        if new_state == PhilosopherState::Eating {
            let left = phil.left_fork();
            let right = phil.right_fork(self.count);
            let holds = |fork: ForkId| state.holders.get(fork.0).copied().flatten() == Some(phil);
            if !(holds(left) && holds(right)) {
                Self::violate(&mut state, Violation::EatingWithoutForks { phil });
            }
            state.meals[phil.0] += 1;
        }
    }

    fn on_fork_taken(&self, fork: ForkId, phil: PhilosopherId) {
        let mut state = self.state.lock();
        self.record(&mut state, TableEvent::ForkTaken { fork, phil });
        debug!(fork = fork.0, phil = phil.0, "fork taken");

        if let Err(err) = validate_fork_taken(self.count, fork, phil) {
            Self::violate(
                &mut state,
                Violation::BadForkTaken {
                    fork,
                    phil,
                    reason: err.to_string(),
                },
            );
            return;
        }

        if let Some(holder) = state.holders[fork.0] {
            Self::violate(&mut state, Violation::DoubleHeld { fork, holder, taker: phil });
        }
        state.holders[fork.0] = Some(phil);
    }

    fn on_fork_available(&self, fork: ForkId) {
        let mut state = self.state.lock();
        self.record(&mut state, TableEvent::ForkAvailable { fork });
        debug!(fork = fork.0, "fork available");

        let Some(slot) = state.holders.get_mut(fork.0) else {
            return;
        };
        if slot.take().is_none() {
            Self::violate(&mut state, Violation::ReleasedFree { fork });
        }
    }
}
