//! Agent control - pause, resume and stop signals for one philosopher.
//!
//! Every agent owns an [`AgentControl`]; the supervisor keeps a clone and
//! flips its flags. The agent observes them at cooperative checkpoints and
//! inside [`AgentControl::sleep`], which is interruptible:
//!
//! ```text
//!   sampled D
//! |=======|            paused            |===========|
//! 0       t  ─────── (not counted) ────► resume      D - t remaining
//! ```
//!
//! Only the busy portions count towards `D`, so a pause never lengthens or
//! shortens the sampled duration.

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Shared cancellation flag checked by blocked `acquire` calls.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that has not fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token. Waiters still need a wake-up to notice.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A stop signal interrupted a checkpoint or a sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("agent stopped")]
pub struct Stopped;

/// Timing breakdown of one interruptible sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SleepReport {
    /// Duration originally asked for
    pub requested: Duration,
    /// Busy time actually slept (equals `requested` on completion)
    pub slept: Duration,
    /// Wall-clock time spent paused, excluded from `slept`
    pub paused: Duration,
    /// Number of pauses that landed inside this sleep
    pub interruptions: u32,
}

#[derive(Debug, Default)]
struct ControlState {
    paused: bool,
    stopped: bool,
    /// Set while the pause flag is up
    paused_since: Option<Instant>,
    /// Closed pause intervals so far
    paused_total: Duration,
}

#[derive(Debug, Default)]
struct ControlInner {
    state: Mutex<ControlState>,
    changed: Condvar,
    cancel: CancelToken,
}

/// Pause/stop handle shared between one agent and its supervisor.
#[derive(Debug, Clone, Default)]
pub struct AgentControl {
    inner: Arc<ControlInner>,
}

impl AgentControl {
    /// Creates a running (unpaused, unstopped) control.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token fired by `stop`, for passing to the arbiter.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.inner.cancel
    }

    /// Sets the pause flag and wakes the agent if it is sleeping.
    pub fn pause(&self) {
        let mut state = self.inner.state.lock();
        if !state.paused {
            state.paused_since = Some(Instant::now());
        }
        state.paused = true;
        self.inner.changed.notify_all();
    }

    /// Clears the pause flag and releases the agent from its pause wait.
    pub fn resume(&self) {
        let mut state = self.inner.state.lock();
        if let Some(since) = state.paused_since.take() {
            state.paused_total += since.elapsed();
        }
        state.paused = false;
        self.inner.changed.notify_all();
    }

    /// Asks the agent to exit at its next checkpoint.
    ///
    /// Also fires the cancel token; the caller must wake the arbiter so a
    /// blocked `acquire` notices.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock();
        state.stopped = true;
        self.inner.cancel.cancel();
        self.inner.changed.notify_all();
    }

    /// Returns true if the pause flag is set.
    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().paused
    }

    /// Returns the wall-clock time the pause flag has been up since creation,
    /// including a pause still in progress.
    pub fn paused_total(&self) -> Duration {
        let state = self.inner.state.lock();
        state.paused_total + state.paused_since.map_or(Duration::ZERO, |since| since.elapsed())
    }

    /// Returns true once `stop` has been called.
    pub fn is_stopped(&self) -> bool {
        self.inner.state.lock().stopped
    }

    /// Cooperative checkpoint: blocks while paused.
    ///
    /// # Returns
    /// * `Ok(paused_for)` - running; how long this call waited on the pause flag
    /// * `Err(Stopped)` - the agent must exit
    pub fn checkpoint(&self) -> Result<Duration, Stopped> {
        let mut state = self.inner.state.lock();
        let mut paused_for = Duration::ZERO;

        if state.paused && !state.stopped {
            let paused_at = Instant::now();
            while state.paused && !state.stopped {
                self.inner.changed.wait(&mut state);
            }
            paused_for = paused_at.elapsed();
        }

        if state.stopped {
            Err(Stopped)
        } else {
            Ok(paused_for)
        }
    }

    /// Sleeps for `duration` of busy time.
    ///
    /// A pause suspends the sleep immediately; after resume only the
    /// remaining part of `duration` is slept. Stop aborts at once.
    pub fn sleep(&self, duration: Duration) -> Result<SleepReport, Stopped> {
        let mut report = SleepReport {
            requested: duration,
            ..SleepReport::default()
        };
        let mut state = self.inner.state.lock();

        loop {
            if state.stopped {
                return Err(Stopped);
            }

            if state.paused {
                report.interruptions += 1;
                let paused_at = Instant::now();
                while state.paused && !state.stopped {
                    self.inner.changed.wait(&mut state);
                }
                report.paused += paused_at.elapsed();
                continue;
            }

            let remaining = duration.saturating_sub(report.slept);
            if remaining.is_zero() {
                return Ok(report);
            }

            let started = Instant::now();
            self.inner.changed.wait_for(&mut state, remaining);
            report.slept += started.elapsed().min(remaining);
        }
    }
}
