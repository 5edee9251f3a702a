//! Single-shot resettable idle timer
//!
//! Each arm gets a generation number. Fires are posted as that number into
//! the coordinator's expiry channel and only accepted while the generation
//! is still current, so a fire already in flight when the timer is reset or
//! cleared is discarded.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub struct IdleTimer {
    expiries: mpsc::UnboundedSender<u64>,
    generation: u64,
    deadline: Option<Instant>,
    task: Option<JoinHandle<()>>,
}

impl IdleTimer {
    /// Create a disarmed timer posting fires into `expiries`
    #[must_use]
    pub const fn new(expiries: mpsc::UnboundedSender<u64>) -> Self {
        Self {
            expiries,
            generation: 0,
            deadline: None,
            task: None,
        }
    }

    /// Cancel any pending timer and schedule a new one `timeout` from now
    pub fn arm(&mut self, timeout: Duration) {
        self.cancel();

        let generation = self.generation;
        let deadline = Instant::now() + timeout;
        let expiries = self.expiries.clone();

        self.deadline = Some(deadline);
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = expiries.send(generation);
        }));

        tracing::trace!(generation, timeout_ms = timeout.as_millis(), "idle timer armed");
    }

    /// Cancel the pending timer; idempotent
    pub fn clear(&mut self) {
        if self.deadline.is_some() {
            tracing::trace!(generation = self.generation, "idle timer cleared");
        }
        self.cancel();
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Accept a fire for `generation`
    ///
    /// Returns true, and disarms, only if the fire belongs to the currently
    /// armed timer.
    pub fn take_expiry(&mut self, generation: u64) -> bool {
        if self.deadline.is_none() || generation != self.generation {
            tracing::trace!(generation, current = self.generation, "stale idle fire ignored");
            return false;
        }

        self.deadline = None;
        self.task = None;
        self.generation += 1;
        true
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.deadline = None;
        self.generation += 1;
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
