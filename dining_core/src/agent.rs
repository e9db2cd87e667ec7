//! Philosopher Agent - the think → hungry → eat cycle of one seat.
//!
//! Each agent runs on its own thread and talks to the shared
//! [`ResourceArbiter`] only through `acquire`/`release`:
//!
//! ```text
//!        ┌──────────┐  sleep(think)  ┌────────┐  acquire()  ┌────────┐
//!   ┌───►│ Thinking │───────────────►│ Hungry │────────────►│ Eating │
//!   │    └──────────┘                └────────┘             └───┬────┘
//!   │                     release()                             │ sleep(eat)
//!   └───────────────────────────────────────────────────────────┘
//! ```
//!
//! A checkpoint sits at every step boundary. The loop only ends on a stop
//! signal, and forks taken in the current round are always released first.

use crate::arbiter::ResourceArbiter;
use crate::config::TimingRange;
use crate::control::{AgentControl, Stopped};
use crate::error::AcquireError;

use dining_env::{ConfigError, DiningContext, ForkId, Observer, PhilosopherId, PhilosopherState};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, trace};

/// Final tally handed back by an agent when it exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgentReport {
    pub id: PhilosopherId,
    /// Total time spent hungry before getting both forks, not counting time
    /// this agent spent paused
    pub hungry_time: Duration,
    /// Completed Hungry → Eating transitions
    pub meals: u64,
}

/// Live view of an agent, readable while the simulation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgentStatus {
    pub id: PhilosopherId,
    pub state: PhilosopherState,
    pub paused: bool,
    pub hungry_time: Duration,
    pub meals: u64,
    pub exited: bool,
}

/// Counters shared between an agent thread and the supervisor.
#[derive(Debug, Default)]
pub struct AgentStats {
    hungry_nanos: AtomicU64,
    meals: AtomicU64,
    state: AtomicU8,
    exited: AtomicBool,
}

impl AgentStats {
    /// Returns the accumulated hungry time.
    pub fn hungry_time(&self) -> Duration {
        Duration::from_nanos(self.hungry_nanos.load(Ordering::Relaxed))
    }

    /// Returns the number of meals so far.
    pub fn meals(&self) -> u64 {
        self.meals.load(Ordering::Relaxed)
    }

    /// Returns the last reported state.
    pub fn state(&self) -> PhilosopherState {
        PhilosopherState::try_from(self.state.load(Ordering::Relaxed))
            .unwrap_or(PhilosopherState::Thinking)
    }

    /// Returns true once the agent thread has left its loop.
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    fn add_hungry(&self, waited: Duration) {
        self.hungry_nanos
            .fetch_add(waited.as_nanos() as u64, Ordering::Relaxed);
        self.meals.fetch_add(1, Ordering::Relaxed);
    }

    fn set_state(&self, state: PhilosopherState) {
        self.state.store(state.code(), Ordering::Relaxed);
    }
}

/// Why the loop ended.
#[derive(Debug)]
enum Exit {
    Stopped,
    Config(ConfigError),
}

impl From<Stopped> for Exit {
    fn from(_: Stopped) -> Self {
        Exit::Stopped
    }
}

impl From<AcquireError> for Exit {
    fn from(err: AcquireError) -> Self {
        match err {
            AcquireError::Cancelled => Exit::Stopped,
            AcquireError::Config(e) => Exit::Config(e),
        }
    }
}

/// One philosopher at the table.
///
/// Generic over the context so the same agent runs against the system clock
/// or a seeded simulation context.
pub struct PhilosopherAgent<Ctx: DiningContext> {
    id: PhilosopherId,
    left: ForkId,
    right: ForkId,
    think: TimingRange,
    eat: TimingRange,
    arbiter: Arc<ResourceArbiter>,
    observer: Arc<dyn Observer>,
    control: AgentControl,
    stats: Arc<AgentStats>,
    context: Arc<Ctx>,
}

impl<Ctx: DiningContext> PhilosopherAgent<Ctx> {
    /// Creates the agent for seat `id` at a table of `count` seats.
    ///
    /// Forks follow the ring layout: `left = id`, `right = (id - 1 + count) mod count`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: PhilosopherId,
        count: usize,
        think: TimingRange,
        eat: TimingRange,
        arbiter: Arc<ResourceArbiter>,
        observer: Arc<dyn Observer>,
        control: AgentControl,
        context: Arc<Ctx>,
    ) -> Result<Self, ConfigError> {
        id.check(count)?;
        think.validate("think")?;
        eat.validate("eat")?;

        Ok(Self {
            id,
            left: id.left_fork(),
            right: id.right_fork(count),
            think,
            eat,
            arbiter,
            observer,
            control,
            stats: Arc::new(AgentStats::default()),
            context,
        })
    }

    /// Returns the seat index.
    pub fn id(&self) -> PhilosopherId {
        self.id
    }

    /// Returns `(left, right)` forks.
    pub fn forks(&self) -> (ForkId, ForkId) {
        (self.left, self.right)
    }

    /// Returns the shared counters for live status reads.
    pub fn stats(&self) -> Arc<AgentStats> {
        Arc::clone(&self.stats)
    }

    /// Cycles until stopped and returns the final tally.
    pub fn run(self) -> AgentReport {
        debug!(
            phil = self.id.0,
            left = self.left.0,
            right = self.right.0,
            "philosopher seated"
        );

        let exit = loop {
            if let Err(exit) = self.cycle() {
                break exit;
            }
        };

        if let Exit::Config(err) = exit {
            error!(phil = self.id.0, %err, "philosopher left the table");
        }
        self.stats.exited.store(true, Ordering::Release);

        let report = AgentReport {
            id: self.id,
            hungry_time: self.stats.hungry_time(),
            meals: self.stats.meals(),
        };
        debug!(
            phil = self.id.0,
            meals = report.meals,
            hungry_ms = report.hungry_time.as_millis() as u64,
            "philosopher stopped"
        );
        report
    }

    /// One full round: think, get hungry, eat, put the forks down.
    fn cycle(&self) -> Result<(), Exit> {
        self.control.checkpoint()?;
        self.enter(PhilosopherState::Thinking);
        self.control.sleep(self.think.sample(self.context.as_ref()))?;

        self.control.checkpoint()?;
        self.enter(PhilosopherState::Hungry);
        let hungry_since = self.context.now();
        let paused_before = self.control.paused_total();
        self.arbiter
            .acquire(self.id, self.left, self.right, self.control.cancel_token())?;

        // A pause does not interrupt acquire; keep it out of the hunger tally
        let paused = self.control.paused_total().saturating_sub(paused_before);
        let waited = self
            .context
            .now()
            .saturating_sub(hungry_since)
            .saturating_sub(paused);
        self.stats.add_hungry(waited);
        trace!(phil = self.id.0, waited_ms = waited.as_millis() as u64, "got both forks");

        // Forks go back on the table even when a stop lands mid-meal
        let meal = self.eat();
        self.arbiter.release(self.left, self.right);
        meal
    }

    fn eat(&self) -> Result<(), Exit> {
        self.control.checkpoint()?;
        self.enter(PhilosopherState::Eating);
        self.control.sleep(self.eat.sample(self.context.as_ref()))?;
        self.control.checkpoint()?;
        Ok(())
    }

    fn enter(&self, state: PhilosopherState) {
        self.stats.set_state(state);
        self.observer.on_state_change(self.id, state);
    }
}
