//! Resource Arbiter - exclusive fork ownership under concurrency.
//!
//! The arbiter is the only component with shared mutable fork state. All
//! reads and writes of fork holders and the wait queue happen under a single
//! mutex; waiting philosophers block on the associated condition variable and
//! every state change that could unblock someone is followed by a broadcast.
//!
//! # Strategies
//!
//! ```text
//! Independent:  take(left) ──wait──► take(right)      deadlock-prone
//! Paired:       take(left + right) atomically         deadlock-free, may starve
//! Fair:         Paired + FIFO queue with promotion    deadlock-free, queued
//! ```
//!
//! The arbitration decision itself lives in [`ForkTable::evaluate`], a pure
//! function of the table state, so the ordering rules are testable without
//! threads.

use crate::control::CancelToken;
use crate::error::AcquireError;

use dining_env::{validate_fork_taken, ConfigError, ForkId, Observer, PhilosopherId};
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

/// Fork arbitration policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Left fork, then right fork, as two separate waits.
    ///
    /// If every philosopher takes its left fork before anyone takes a right
    /// fork the ring deadlocks. Kept for fault injection only.
    Independent,

    /// Both forks in one atomic step, only when both are free.
    #[default]
    Paired,

    /// Paired acquisition served in hunger order, with promotion of
    /// philosophers whose forks would otherwise sit idle.
    Fair,
}

impl Strategy {
    /// Returns all strategies.
    pub fn all() -> Vec<Strategy> {
        vec![Strategy::Independent, Strategy::Paired, Strategy::Fair]
    }

    /// Returns the strategy name.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Independent => "independent",
            Strategy::Paired => "paired",
            Strategy::Fair => "fair",
        }
    }

    /// Returns a description of the strategy.
    pub fn description(&self) -> &'static str {
        match self {
            Strategy::Independent => "left then right fork; can deadlock",
            Strategy::Paired => "both forks atomically; deadlock-free, may starve",
            Strategy::Fair => "both forks atomically in queue order with promotion",
        }
    }

    /// Returns true if the strategy can never form a circular wait.
    pub fn is_deadlock_free(&self) -> bool {
        !matches!(self, Strategy::Independent)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "independent" | "naive" => Ok(Strategy::Independent),
            "paired" | "atomic" => Ok(Strategy::Paired),
            "fair" | "queue" => Ok(Strategy::Fair),
            _ => Err(ConfigError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Outcome of evaluating a waiting philosopher against the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Both forks may be taken now
    Grant,
    /// Forks are free but the philosopher is not at the head: move it there
    Promote,
    /// Keep waiting
    Wait,
}

/// Fork holders and the hunger queue, without any synchronization.
#[derive(Debug, Clone)]
pub struct ForkTable {
    holders: Vec<Option<PhilosopherId>>,
    queue: VecDeque<PhilosopherId>,
}

impl ForkTable {
    /// Creates a table with `count` free forks and an empty queue.
    pub fn new(count: usize) -> Self {
        Self {
            holders: vec![None; count],
            queue: VecDeque::new(),
        }
    }

    /// Returns the number of forks.
    pub fn len(&self) -> usize {
        self.holders.len()
    }

    /// Returns true if the table has no forks.
    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Returns the philosopher holding `fork`, if any.
    pub fn holder(&self, fork: ForkId) -> Option<PhilosopherId> {
        self.holders[fork.0]
    }

    /// Returns true if `fork` is on the table.
    pub fn is_free(&self, fork: ForkId) -> bool {
        self.holders[fork.0].is_none()
    }

    /// Returns the hunger queue, head first.
    pub fn queue(&self) -> &VecDeque<PhilosopherId> {
        &self.queue
    }

    /// Appends `phil` to the queue unless it is already queued.
    pub fn enqueue(&mut self, phil: PhilosopherId) {
        if !self.queue.contains(&phil) {
            self.queue.push_back(phil);
        }
    }

    /// Removes `phil` from wherever it sits in the queue.
    pub fn dequeue(&mut self, phil: PhilosopherId) -> bool {
        match self.queue.iter().position(|&p| p == phil) {
            Some(pos) => {
                self.queue.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Moves `phil` to the head of the queue.
    pub fn promote(&mut self, phil: PhilosopherId) {
        self.dequeue(phil);
        self.queue.push_front(phil);
    }

    /// Decides whether `phil` may take both `left` and `right` now.
    ///
    /// With `queued == false` (Paired) only fork availability matters. With
    /// `queued == true` (Fair) the philosopher must also be at the head of the
    /// queue; a non-head philosopher whose forks are both free is promoted.
    pub fn evaluate(
        &self,
        phil: PhilosopherId,
        left: ForkId,
        right: ForkId,
        queued: bool,
    ) -> Decision {
        let both_free = self.is_free(left) && self.is_free(right);
        if !both_free {
            return Decision::Wait;
        }
        if !queued || self.queue.front() == Some(&phil) {
            Decision::Grant
        } else {
            Decision::Promote
        }
    }

    /// Hands `fork` to `phil`.
    ///
    /// # Panics
    /// If the fork is already held. That is an arbitration bug.
    pub fn take(&mut self, fork: ForkId, phil: PhilosopherId) {
        if let Some(owner) = self.holders[fork.0] {
            panic!(
                "invariant violation: fork {} taken by philosopher {} while held by {}",
                fork, phil, owner
            );
        }
        self.holders[fork.0] = Some(phil);
    }

    /// Puts `fork` back on the table and returns its previous holder.
    ///
    /// # Panics
    /// If the fork is not held.
    pub fn put(&mut self, fork: ForkId) -> PhilosopherId {
        match self.holders[fork.0].take() {
            Some(owner) => owner,
            None => panic!("invariant violation: fork {} released while free", fork),
        }
    }

    /// Takes both forks for `phil` after a `Grant`, leaving the queue if queued.
    pub fn grant_pair(&mut self, phil: PhilosopherId, left: ForkId, right: ForkId, queued: bool) {
        if queued {
            let head = self.queue.pop_front();
            assert_eq!(
                head,
                Some(phil),
                "invariant violation: philosopher {} served while not at queue head",
                phil
            );
        }
        self.take(left, phil);
        self.take(right, phil);
    }

    /// Copies the table for diagnostics.
    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            holders: self.holders.clone(),
            queue: self.queue.iter().copied().collect(),
        }
    }
}

/// Point-in-time copy of the arbiter state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Holder of each fork, indexed by fork id
    pub holders: Vec<Option<PhilosopherId>>,
    /// Hunger queue, head first (always empty unless Fair)
    pub queue: Vec<PhilosopherId>,
}

impl TableSnapshot {
    /// Returns true if every fork is on the table.
    pub fn all_free(&self) -> bool {
        self.holders.iter().all(Option::is_none)
    }

    /// Returns the number of forks currently held.
    pub fn held_count(&self) -> usize {
        self.holders.iter().filter(|h| h.is_some()).count()
    }
}

/// Callback run by the Independent strategy after the left fork is taken.
pub type LeftForkHook = Arc<dyn Fn(PhilosopherId) + Send + Sync>;

/// Mediates exclusive access to the forks of one table.
pub struct ResourceArbiter {
    strategy: Strategy,

    /// Fork holders and hunger queue
    table: Mutex<ForkTable>,

    /// Signalled on every release, every Fair grant and every cancellation
    changed: Condvar,

    observer: Arc<dyn Observer>,

    /// Fault injection for Independent (runs outside the lock)
    left_fork_hook: Option<LeftForkHook>,
}

impl ResourceArbiter {
    /// Creates an arbiter for a ring of `count` forks.
    pub fn new(
        count: usize,
        strategy: Strategy,
        observer: Arc<dyn Observer>,
    ) -> Result<Self, ConfigError> {
        if count < 2 {
            return Err(ConfigError::TooFewPhilosophers(count));
        }
        Ok(Self {
            strategy,
            table: Mutex::new(ForkTable::new(count)),
            changed: Condvar::new(),
            observer,
            left_fork_hook: None,
        })
    }

    /// Installs a callback that runs between the left and right fork waits of
    /// the Independent strategy. Other strategies never call it.
    pub fn with_left_fork_hook(mut self, hook: LeftForkHook) -> Self {
        self.left_fork_hook = Some(hook);
        self
    }

    /// Returns the arbitration strategy.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Returns the number of forks on the table.
    pub fn fork_count(&self) -> usize {
        self.table.lock().len()
    }

    /// Blocks until `phil` holds both `left` and `right`.
    ///
    /// # Returns
    /// * `Ok(())` - both forks are held by `phil`
    /// * `Err(AcquireError::Cancelled)` - `cancel` fired while blocked; no fork
    ///   is held and `phil` is no longer queued
    /// * `Err(AcquireError::Config)` - bad indices; nothing was changed
    pub fn acquire(
        &self,
        phil: PhilosopherId,
        left: ForkId,
        right: ForkId,
        cancel: &CancelToken,
    ) -> Result<(), AcquireError> {
        let mut table = self.table.lock();
        Self::validate(table.len(), phil, left, right)?;

        match self.strategy {
            Strategy::Independent => self.acquire_independent(&mut table, phil, left, right, cancel),
            Strategy::Paired => self.acquire_pair(&mut table, phil, left, right, false, cancel),
            Strategy::Fair => self.acquire_pair(&mut table, phil, left, right, true, cancel),
        }
    }

    /// Puts both forks back on the table and wakes every waiter.
    ///
    /// Never blocks beyond the table lock.
    ///
    /// # Panics
    /// If either fork is not currently held.
    pub fn release(&self, left: ForkId, right: ForkId) {
        let mut table = self.table.lock();
        for fork in [left, right] {
            let owner = table.put(fork);
            trace!(fork = fork.0, phil = owner.0, "fork released");
            self.observer.on_fork_available(fork);
        }
        self.changed.notify_all();
    }

    /// Wakes every blocked `acquire` so it re-checks its cancel token.
    pub fn wake_all(&self) {
        let _table = self.table.lock();
        self.changed.notify_all();
    }

    /// Returns a copy of the fork holders and queue.
    pub fn snapshot(&self) -> TableSnapshot {
        self.table.lock().snapshot()
    }

    fn validate(
        count: usize,
        phil: PhilosopherId,
        left: ForkId,
        right: ForkId,
    ) -> Result<(), ConfigError> {
        validate_fork_taken(count, left, phil)?;
        validate_fork_taken(count, right, phil)?;
        if left == right {
            return Err(ConfigError::DegenerateForkPair {
                phil: phil.0,
                fork: left.0,
            });
        }
        Ok(())
    }

    fn acquire_pair(
        &self,
        table: &mut MutexGuard<'_, ForkTable>,
        phil: PhilosopherId,
        left: ForkId,
        right: ForkId,
        queued: bool,
        cancel: &CancelToken,
    ) -> Result<(), AcquireError> {
        if queued {
            table.enqueue(phil);
        }

        loop {
            if cancel.is_cancelled() {
                if queued && table.dequeue(phil) {
                    // Someone else may have become head
                    self.changed.notify_all();
                }
                return Err(AcquireError::Cancelled);
            }

            match table.evaluate(phil, left, right, queued) {
                Decision::Grant => break,
                Decision::Promote => {
                    debug!(phil = phil.0, "forks idle, promoting to queue head");
                    table.promote(phil);
                }
                Decision::Wait => self.changed.wait(table),
            }
        }

        table.grant_pair(phil, left, right, queued);
        if queued {
            // A new philosopher is at the head; give it a chance to eat
            self.changed.notify_all();
        }

        self.observer.on_fork_taken(left, phil);
        self.observer.on_fork_taken(right, phil);
        trace!(phil = phil.0, left = left.0, right = right.0, "forks granted");
        Ok(())
    }

    fn acquire_independent(
        &self,
        table: &mut MutexGuard<'_, ForkTable>,
        phil: PhilosopherId,
        left: ForkId,
        right: ForkId,
        cancel: &CancelToken,
    ) -> Result<(), AcquireError> {
        while !table.is_free(left) {
            if cancel.is_cancelled() {
                return Err(AcquireError::Cancelled);
            }
            self.changed.wait(table);
        }
        table.take(left, phil);
        self.observer.on_fork_taken(left, phil);
        trace!(phil = phil.0, fork = left.0, "left fork taken");

        if let Some(hook) = &self.left_fork_hook {
            MutexGuard::unlocked(table, || hook(phil));
        }

        loop {
            if cancel.is_cancelled() {
                // Never keep half a pair
                table.put(left);
                self.observer.on_fork_available(left);
                self.changed.notify_all();
                return Err(AcquireError::Cancelled);
            }
            if table.is_free(right) {
                break;
            }
            self.changed.wait(table);
        }
        table.take(right, phil);
        self.observer.on_fork_taken(right, phil);
        trace!(phil = phil.0, fork = right.0, "right fork taken");
        Ok(())
    }
}

impl std::fmt::Debug for ResourceArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceArbiter")
            .field("strategy", &self.strategy)
            .field("table", &*self.table.lock())
            .finish()
    }
}
