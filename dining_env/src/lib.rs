//! Dining Philosophers Environment Abstraction Layer
//!
//! This crate holds everything the arbitration engine needs from the
//! outside world, so the core can run unchanged against the real clock or a
//! seeded simulation:
//! - Time (`now()`)
//! - Randomness (`sample_millis()`)
//! - Threads (`spawn()`)
//! - Notifications (`Observer`)
//!
//! # Example
//!
//! ```ignore
//! use dining_env::{DiningContext, SystemContext, PhilosopherId};
//!
//! let ctx = SystemContext::shared();
//! let think_ms = ctx.sample_millis(1000, 2000);
//! let phil = PhilosopherId(3);
//! assert_eq!(phil.right_fork(5).0, 2);
//! ```

mod context;
mod error;
mod observer;
mod system_impl;
mod types;

pub use context::DiningContext;
pub use error::ConfigError;
pub use observer::{validate_fork_taken, NullObserver, Observer};
pub use system_impl::SystemContext;
pub use types::{ForkId, PhilosopherId, PhilosopherState};
