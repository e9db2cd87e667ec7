//! Supervisor - owns the table topology and the global lifecycle.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Supervisor                        │
//! │   pause() / resume() / stop() ──► AgentControl (x N)     │
//! │                                                          │
//! │  ┌───────────┐  ┌───────────┐        ┌───────────┐       │
//! │  │ Agent #0  │  │ Agent #1  │  ...   │ Agent #N-1│       │
//! │  └─────┬─────┘  └─────┬─────┘        └─────┬─────┘       │
//! │        │ acquire/release                   │             │
//! │  ┌─────▼──────────────▼────────────────────▼──────────┐  │
//! │  │               ResourceArbiter (N forks)            │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Agents report back over a channel when they exit; `stop` aggregates those
//! reports into a [`HungerReport`].

use crate::agent::{AgentReport, AgentStats, AgentStatus, PhilosopherAgent};
use crate::arbiter::{ResourceArbiter, Strategy, TableSnapshot};
use crate::config::SimulationConfig;
use crate::control::AgentControl;
use crate::error::DiningError;
use crate::stats::HungerReport;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use dining_env::{ConfigError, DiningContext, Observer, PhilosopherId};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Supervisor-side handle to one running agent.
struct AgentHandle {
    id: PhilosopherId,
    control: AgentControl,
    stats: Arc<AgentStats>,
    thread: JoinHandle<()>,
}

/// Runs a table of philosophers.
pub struct Supervisor {
    config: SimulationConfig,
    arbiter: Arc<ResourceArbiter>,
    agents: Vec<AgentHandle>,
    done_rx: Receiver<AgentReport>,
    started_at: Instant,
}

impl Supervisor {
    /// Validates `config`, builds the arbiter and launches one thread per seat.
    pub fn start<Ctx: DiningContext>(
        config: SimulationConfig,
        observer: Arc<dyn Observer>,
        context: Arc<Ctx>,
    ) -> Result<Self, DiningError> {
        config.validate()?;
        let arbiter = Arc::new(ResourceArbiter::new(
            config.num_philosophers,
            config.strategy,
            Arc::clone(&observer),
        )?);
        Self::start_with_arbiter(config, arbiter, observer, context)
    }

    /// Like `start`, with a caller-built arbiter (e.g. one carrying a
    /// fault-injection hook). The arbiter must have one fork per seat.
    pub fn start_with_arbiter<Ctx: DiningContext>(
        config: SimulationConfig,
        arbiter: Arc<ResourceArbiter>,
        observer: Arc<dyn Observer>,
        context: Arc<Ctx>,
    ) -> Result<Self, DiningError> {
        config.validate()?;
        let n = config.num_philosophers;
        if arbiter.fork_count() != n {
            return Err(ConfigError::ForkCountMismatch {
                forks: arbiter.fork_count(),
                philosophers: n,
            }
            .into());
        }

        // Build every agent before spawning any, so a bad seat starts nothing
        let mut seated = Vec::with_capacity(n);
        for i in 0..n {
            let control = AgentControl::new();
            let agent = PhilosopherAgent::new(
                PhilosopherId(i),
                n,
                config.think,
                config.eat,
                Arc::clone(&arbiter),
                Arc::clone(&observer),
                control.clone(),
                Arc::clone(&context),
            )?;
            seated.push((agent, control));
        }

        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        let mut supervisor = Self {
            config,
            arbiter,
            agents: Vec::with_capacity(n),
            done_rx,
            started_at: Instant::now(),
        };

        for (agent, control) in seated {
            let id = agent.id();
            let stats = agent.stats();
            let tx = done_tx.clone();
            let thread = context
                .spawn(&format!("philosopher-{}", id.0), move || {
                    let report = agent.run();
                    // The supervisor may already have given up on us
                    let _ = tx.send(report);
                })
                .map_err(|e| DiningError::spawn(id.0, e))?;
            supervisor.agents.push(AgentHandle {
                id,
                control,
                stats,
                thread,
            });
        }

        info!(
            philosophers = n,
            strategy = %supervisor.config.strategy,
            seed = context.seed(),
            "simulation started"
        );
        Ok(supervisor)
    }

    /// Starts a run, lets it go for the configured duration, then stops it.
    pub fn run_for<Ctx: DiningContext>(
        config: SimulationConfig,
        observer: Arc<dyn Observer>,
        context: Arc<Ctx>,
    ) -> Result<HungerReport, DiningError> {
        let duration = config.run_duration().ok_or(ConfigError::MissingRunDuration)?;
        let supervisor = Self::start(config, observer, context)?;
        std::thread::sleep(duration);
        supervisor.stop(None)
    }

    /// Returns the configuration this run was started with.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Returns the arbitration strategy.
    pub fn strategy(&self) -> Strategy {
        self.arbiter.strategy()
    }

    /// Returns the number of seats.
    pub fn philosopher_count(&self) -> usize {
        self.config.num_philosophers
    }

    /// Returns wall-clock time since start.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the shared arbiter.
    pub fn arbiter(&self) -> &Arc<ResourceArbiter> {
        &self.arbiter
    }

    /// Returns a copy of the fork holders and wait queue.
    pub fn snapshot(&self) -> TableSnapshot {
        self.arbiter.snapshot()
    }

    /// Pauses every agent; sleepers suspend immediately.
    pub fn pause(&self) {
        for agent in &self.agents {
            agent.control.pause();
        }
        info!("simulation paused");
    }

    /// Resumes every agent.
    pub fn resume(&self) {
        for agent in &self.agents {
            agent.control.resume();
        }
        info!("simulation resumed");
    }

    /// Returns true if every agent is paused.
    pub fn is_paused(&self) -> bool {
        !self.agents.is_empty() && self.agents.iter().all(|a| a.control.is_paused())
    }

    /// Pauses a single philosopher.
    pub fn pause_philosopher(&self, id: PhilosopherId) -> Result<(), ConfigError> {
        self.handle(id)?.control.pause();
        debug!(phil = id.0, "philosopher paused");
        Ok(())
    }

    /// Resumes a single philosopher.
    pub fn resume_philosopher(&self, id: PhilosopherId) -> Result<(), ConfigError> {
        self.handle(id)?.control.resume();
        debug!(phil = id.0, "philosopher resumed");
        Ok(())
    }

    /// Returns a live status line per philosopher.
    pub fn status(&self) -> Vec<AgentStatus> {
        self.agents
            .iter()
            .map(|a| AgentStatus {
                id: a.id,
                state: a.stats.state(),
                paused: a.control.is_paused(),
                hungry_time: a.stats.hungry_time(),
                meals: a.stats.meals(),
                exited: a.stats.has_exited(),
            })
            .collect()
    }

    /// Signals every agent to exit and aggregates their hunger statistics.
    ///
    /// Agents blocked in `acquire` abort without holding forks; agents that
    /// are eating put their forks down first. With `timeout = None` this
    /// waits until every agent has exited.
    pub fn stop(mut self, timeout: Option<Duration>) -> Result<HungerReport, DiningError> {
        let agents = std::mem::take(&mut self.agents);
        for agent in &agents {
            agent.control.stop();
        }
        self.arbiter.wake_all();

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut reports = Vec::with_capacity(agents.len());
        while reports.len() < agents.len() {
            let next = match deadline {
                Some(deadline) => self.done_rx.recv_deadline(deadline),
                None => self.done_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match next {
                Ok(report) => reports.push(report),
                Err(_) => break,
            }
        }

        let reported: HashSet<PhilosopherId> = reports.iter().map(|r| r.id).collect();
        let mut pending = Vec::new();
        for agent in agents {
            if reported.contains(&agent.id) {
                if agent.thread.join().is_err() {
                    return Err(DiningError::AgentPanicked(agent.id.0));
                }
            } else if agent.thread.is_finished() {
                // Finished without a report: it unwound
                let _ = agent.thread.join();
                return Err(DiningError::AgentPanicked(agent.id.0));
            } else {
                pending.push(agent.id.0);
            }
        }

        if !pending.is_empty() {
            warn!(?pending, "philosophers did not stop in time");
            return Err(DiningError::StopTimeout {
                pending,
                timeout_ms: timeout.map(|t| t.as_millis() as u64).unwrap_or_default(),
            });
        }

        let report = HungerReport::from_reports(reports);
        info!(
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            meals = report.total_meals(),
            mean_hungry_ms = report.mean.as_millis() as u64,
            spread_ms = report.spread.as_millis() as u64,
            "simulation stopped"
        );
        Ok(report)
    }

    fn handle(&self, id: PhilosopherId) -> Result<&AgentHandle, ConfigError> {
        id.check(self.agents.len())?;
        Ok(&self.agents[id.0])
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        // Never leave threads cycling behind a dropped supervisor
        if self.agents.is_empty() {
            return;
        }
        for agent in &self.agents {
            agent.control.stop();
        }
        self.arbiter.wake_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dining_env::{NullObserver, SystemContext};
    use std::thread;

    fn fast_config(n: usize, strategy: Strategy) -> SimulationConfig {
        SimulationConfig::new(n)
            .with_strategy(strategy)
            .with_think(0, 2)
            .with_eat(0, 2)
    }

    #[test]
    fn test_start_rejects_bad_config() {
        let result = Supervisor::start(
            SimulationConfig::new(1),
            Arc::new(NullObserver),
            SystemContext::shared(),
        );
        assert!(matches!(
            result,
            Err(DiningError::Config(ConfigError::TooFewPhilosophers(1)))
        ));

        let result = Supervisor::start(
            SimulationConfig::new(3).with_think(5, 1),
            Arc::new(NullObserver),
            SystemContext::shared(),
        );
        assert!(matches!(
            result,
            Err(DiningError::Config(ConfigError::InvalidRange { .. }))
        ));
    }

    #[test]
    fn test_start_and_stop() {
        let supervisor = Supervisor::start(
            fast_config(5, Strategy::Paired),
            Arc::new(NullObserver),
            SystemContext::shared(),
        )
        .unwrap();
        assert_eq!(supervisor.philosopher_count(), 5);

        thread::sleep(Duration::from_millis(100));
        let arbiter = Arc::clone(supervisor.arbiter());
        let report = supervisor.stop(Some(Duration::from_secs(5))).unwrap();

        assert_eq!(report.philosophers.len(), 5);
        assert!(report.total_meals() > 0);
        assert!(arbiter.snapshot().all_free());
    }

    #[test]
    fn test_pause_freezes_meals() {
        let supervisor = Supervisor::start(
            fast_config(4, Strategy::Fair),
            Arc::new(NullObserver),
            SystemContext::shared(),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        supervisor.pause();
        assert!(supervisor.is_paused());

        // Let in-flight steps reach their next checkpoint
        thread::sleep(Duration::from_millis(50));
        let frozen: u64 = supervisor.status().iter().map(|s| s.meals).sum();
        thread::sleep(Duration::from_millis(100));
        let still: u64 = supervisor.status().iter().map(|s| s.meals).sum();
        assert_eq!(frozen, still);

        supervisor.resume();
        assert!(!supervisor.is_paused());
        thread::sleep(Duration::from_millis(100));
        let resumed: u64 = supervisor.status().iter().map(|s| s.meals).sum();
        assert!(resumed > still);

        supervisor.stop(None).unwrap();
    }

    #[test]
    fn test_stop_while_paused() {
        let supervisor = Supervisor::start(
            fast_config(3, Strategy::Paired),
            Arc::new(NullObserver),
            SystemContext::shared(),
        )
        .unwrap();
        supervisor.pause();
        let report = supervisor.stop(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(report.philosophers.len(), 3);
    }

    #[test]
    fn test_single_philosopher_pause() {
        let supervisor = Supervisor::start(
            fast_config(3, Strategy::Paired),
            Arc::new(NullObserver),
            SystemContext::shared(),
        )
        .unwrap();

        supervisor.pause_philosopher(PhilosopherId(1)).unwrap();
        assert!(!supervisor.is_paused());
        assert!(supervisor.status()[1].paused);
        assert!(supervisor.pause_philosopher(PhilosopherId(3)).is_err());
        supervisor.resume_philosopher(PhilosopherId(1)).unwrap();

        supervisor.stop(None).unwrap();
    }

    #[test]
    fn test_run_for_needs_duration() {
        let result = Supervisor::run_for(
            fast_config(2, Strategy::Paired),
            Arc::new(NullObserver),
            SystemContext::shared(),
        );
        assert!(matches!(
            result,
            Err(DiningError::Config(ConfigError::MissingRunDuration))
        ));

        let report = Supervisor::run_for(
            fast_config(2, Strategy::Paired).with_run_duration(Duration::from_millis(50)),
            Arc::new(NullObserver),
            SystemContext::shared(),
        )
        .unwrap();
        assert_eq!(report.philosophers.len(), 2);
    }
}
