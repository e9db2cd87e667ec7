//! Observer abstraction for table notifications.

use crate::error::ConfigError;
use crate::types::{ForkId, PhilosopherId, PhilosopherState};

/// Receives state and fork notifications from the engine.
///
/// # Implementations
///
/// - **Display front-ends**: render the table
/// - **Simulation**: `TableMonitor` checks invariants as events arrive
///
/// # Call Context
///
/// Fork notifications are delivered while the arbiter holds its lock, so an
/// observer sees fork events in a single global order. Implementations must
/// return quickly and must never call back into the arbiter.
///
/// ```text
/// Agent                 Arbiter                 Observer
///   |-- acquire() -------->|                        |
///   |                      |-- on_fork_taken(l) --->|
///   |                      |-- on_fork_taken(r) --->|
///   |<---------------------|                        |
///   |-- on_state_change(Eating) ------------------->|
/// ```
pub trait Observer: Send + Sync {
    /// A philosopher entered a new state.
    fn on_state_change(&self, phil: PhilosopherId, state: PhilosopherState);

    /// `phil` now holds `fork`.
    ///
    /// `phil` is always one of `fork.neighbors(n)`.
    fn on_fork_taken(&self, fork: ForkId, phil: PhilosopherId);

    /// `fork` is back on the table.
    fn on_fork_available(&self, fork: ForkId);
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn on_state_change(&self, _phil: PhilosopherId, _state: PhilosopherState) {}

    fn on_fork_taken(&self, _fork: ForkId, _phil: PhilosopherId) {}

    fn on_fork_available(&self, _fork: ForkId) {}
}

/// Validates an `on_fork_taken` notification for a table of `count` seats.
///
/// # Returns
/// * `Ok(())` - both indices are in range and `phil` sits next to `fork`
/// * `Err(ConfigError)` - the notification breaks the Observer contract
pub fn validate_fork_taken(
    count: usize,
    fork: ForkId,
    phil: PhilosopherId,
) -> Result<(), ConfigError> {
    fork.check(count)?;
    phil.check(count)?;

    let (left_owner, right_owner) = fork.neighbors(count);
    if phil != left_owner && phil != right_owner {
        return Err(ConfigError::ForkNotAdjacent {
            fork: fork.0,
            phil: phil.0,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_adjacent_forks() {
        // Fork 2 of 5 sits between philosophers 2 and 3
        assert!(validate_fork_taken(5, ForkId(2), PhilosopherId(2)).is_ok());
        assert!(validate_fork_taken(5, ForkId(2), PhilosopherId(3)).is_ok());
        assert_eq!(
            validate_fork_taken(5, ForkId(2), PhilosopherId(4)),
            Err(ConfigError::ForkNotAdjacent { fork: 2, phil: 4 })
        );
    }

    #[test]
    fn test_validate_wraps_around() {
        // The last fork is shared with philosopher 0
        assert!(validate_fork_taken(4, ForkId(3), PhilosopherId(0)).is_ok());
    }

    #[test]
    fn test_validate_out_of_range() {
        assert!(matches!(
            validate_fork_taken(3, ForkId(3), PhilosopherId(0)),
            Err(ConfigError::ForkOutOfRange { .. })
        ));
        assert!(matches!(
            validate_fork_taken(3, ForkId(0), PhilosopherId(5)),
            Err(ConfigError::PhilosopherOutOfRange { .. })
        ));
    }
}
