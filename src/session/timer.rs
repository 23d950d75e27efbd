//! Cancellable delayed actions.
//!
//! All five disambiguation timing windows (fn debounce, multi-tap settle,
//! shortcut cooldowns, middle-click activation delay) are instances of the
//! same pattern: schedule a message to fire after a delay, where a newer
//! schedule supersedes the pending one and cancellation is idempotent.
//!
//! [`CancellableTimer`] implements the pattern with a generation counter.
//! Each schedule aborts the previous sleep task and stamps the fired
//! message with a new generation; the receiver asks [`accepts`] whether a
//! message is current and drops stale ones.  A cancelled or superseded
//! timer therefore can never fire alongside its replacement, even if its
//! message was already in flight when it was cancelled.
//!
//! [`accepts`]: CancellableTimer::accepts

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One delayed action slot.
///
/// # Example
///
/// ```rust
/// # use std::time::Duration;
/// # use push_to_talk::session::CancellableTimer;
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let (tx, mut rx) = tokio::sync::mpsc::channel::<u64>(4);
/// let mut timer = CancellableTimer::new();
///
/// timer.schedule(Duration::from_millis(150), tx.clone(), |generation| generation);
/// // Rescheduling supersedes the pending fire.
/// timer.schedule(Duration::from_millis(150), tx, |generation| generation);
///
/// let generation = rx.recv().await.unwrap();
/// assert!(timer.accepts(generation));
/// assert!(rx.try_recv().is_err()); // the superseded fire never arrives
/// # }
/// ```
#[derive(Debug, Default)]
pub struct CancellableTimer {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl CancellableTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `make(generation)` to be sent on `tx` after `delay`,
    /// superseding any pending fire.
    pub fn schedule<M, F>(&mut self, delay: Duration, tx: mpsc::Sender<M>, make: F)
    where
        M: Send + 'static,
        F: FnOnce(u64) -> M + Send + 'static,
    {
        self.abort_pending();
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;

        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(make(generation)).await;
        }));
    }

    /// Cancel the pending fire, if any.  A no-op when the timer already
    /// fired or was already cancelled.
    pub fn cancel(&mut self) {
        self.abort_pending();
        // Invalidate a fire that may already be sitting in the channel.
        self.generation = self.generation.wrapping_add(1);
    }

    /// Returns `true` when a received `generation` belongs to the most
    /// recent schedule — i.e. the fire was not superseded or cancelled.
    pub fn accepts(&self, generation: u64) -> bool {
        generation == self.generation
    }

    fn abort_pending(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for CancellableTimer {
    fn drop(&mut self) {
        self.abort_pending();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
