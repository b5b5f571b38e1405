//! Ordered, closable output queues between a sandbox and the event bus.
//!
//! An [`OutputChannel`] buffers raw [`LogFragment`]s in an unbounded
//! `tokio::sync::mpsc` queue. Its single [`OutputStream`] hands them out in
//! emit order, HTML-escaped. Closing is terminal for emitters but fragments
//! already queued are still delivered.

use std::sync::{Arc, Mutex, MutexGuard};

use kata_core::LogFragment;
use tokio::sync::mpsc;

use crate::error::ChannelError;

/// Sending half shared by every clone of a channel.
///
/// `None` once the channel is closed, which lets the stream end after it
/// drains what was buffered.
type SharedSender = Arc<Mutex<Option<mpsc::UnboundedSender<LogFragment>>>>;

/// A named, cloneable handle for emitting into one output queue.
#[derive(Clone)]
pub struct OutputChannel {
    name: &'static str,
    sender: SharedSender,
    receiver: Arc<Mutex<Option<mpsc::UnboundedReceiver<LogFragment>>>>,
}

impl OutputChannel {
    pub fn new(name: &'static str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name,
            sender: Arc::new(Mutex::new(Some(tx))),
            receiver: Arc::new(Mutex::new(Some(rx))),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Queue a fragment for delivery.
    pub fn emit(&self, fragment: impl Into<LogFragment>) -> Result<(), ChannelError> {
        let sender = lock(&self.sender);
        let tx = sender.as_ref().ok_or(ChannelError::Closed(self.name))?;
        tx.send(fragment.into())
            .map_err(|_| ChannelError::Closed(self.name))
    }

    /// Take the channel's only stream.
    pub fn subscribe(&self) -> Result<OutputStream, ChannelError> {
        lock(&self.receiver)
            .take()
            .map(|rx| OutputStream { rx })
            .ok_or(ChannelError::AlreadySubscribed(self.name))
    }

    /// Stop accepting fragments.
    ///
    /// Returns `true` only for the call that actually closed the channel.
    pub fn close(&self) -> bool {
        let closed = lock(&self.sender).take().is_some();
        if closed {
            tracing::trace!(channel = self.name, "Output channel closed");
        }
        closed
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.sender).is_none()
    }
}

impl std::fmt::Debug for OutputChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputChannel")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Receiving half of an [`OutputChannel`].
pub struct OutputStream {
    rx: mpsc::UnboundedReceiver<LogFragment>,
}

impl OutputStream {
    /// Next fragment in emit order, sanitized for display.
    ///
    /// Returns `None` once the channel is closed and fully drained.
    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await.map(|fragment| fragment.sanitized())
    }
}

/// Poisoning only means another emitter panicked mid-send; the queue itself
/// is still consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
