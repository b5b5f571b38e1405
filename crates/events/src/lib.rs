//! Observer interface of the challenge execution engine.
//!
//! - [`ChallengeEvent`] -- the state transitions observers react to.
//! - [`StateUpdate`] -- a run-tagged batch of events delivered atomically.
//! - [`EventBus`] -- in-process publish/subscribe hub with an unbounded
//!   queue per subscriber.

pub mod bus;
pub mod event;

pub use bus::{EventBus, RunFamily, StateUpdate};
pub use event::ChallengeEvent;
