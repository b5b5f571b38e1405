//! In-process event bus with one unbounded `tokio::sync::mpsc` queue per
//! subscriber.
//!
//! [`EventBus`] fans [`StateUpdate`]s out to every observer of the
//! challenge workspace. It is designed to be shared via `Arc<EventBus>`.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use kata_core::types::{RunId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::event::ChallengeEvent;

// ---------------------------------------------------------------------------
// RunFamily
// ---------------------------------------------------------------------------

/// Cancellation scope of a run. A new command only supersedes runs of its
/// own family (and Execute additionally supersedes Preview).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunFamily {
    Execute,
    Preview,
}

impl fmt::Display for RunFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execute => f.write_str("execute"),
            Self::Preview => f.write_str("preview"),
        }
    }
}

// ---------------------------------------------------------------------------
// StateUpdate
// ---------------------------------------------------------------------------

/// A batch of events from one run, applied and delivered atomically.
///
/// Observers never see half of a batch: the console reset and log flush
/// that end a preview run arrive in the same update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateUpdate {
    pub run_id: RunId,
    pub family: RunFamily,
    pub events: Vec<ChallengeEvent>,
    pub timestamp: Timestamp,
}

impl StateUpdate {
    pub fn new(run_id: RunId, family: RunFamily, events: Vec<ChallengeEvent>) -> Self {
        Self {
            run_id,
            family,
            events,
            timestamp: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// In-process fan-out event bus.
///
/// Every subscriber owns an unbounded `mpsc` queue, so a slow observer
/// falls behind but never loses an update, and each one sees updates in
/// publish order.
///
/// # Usage
///
/// ```rust
/// use kata_core::types::new_run_id;
/// use kata_events::{ChallengeEvent, EventBus, RunFamily, StateUpdate};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(StateUpdate::new(new_run_id(), RunFamily::Execute, vec![ChallengeEvent::LogsReset]));
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<StateUpdate>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an update to every live subscriber.
    ///
    /// Subscribers whose receiver was dropped are pruned. With no
    /// subscribers the update is dropped.
    pub fn publish(&self, update: StateUpdate) {
        lock(&self.subscribers).retain(|tx| tx.send(update.clone()).is_ok());
    }

    /// Subscribe to every update published after this call.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StateUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Number of subscribers still attached as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}

/// A panicking publisher leaves the subscriber list intact.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
