//! Cooperative, cancellable deadlines shared across nested tasks.
//!
//! One [`Deadline`] is created per scan and cloned into every probe and every
//! sub-check a probe spawns. It fires when its instant passes or when the
//! owning [`DeadlineGuard`] is cancelled or dropped, whichever comes first.
//! Nothing is preempted: work observes the deadline only where it awaits
//! [`Deadline::race`] or [`Deadline::expired`].

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

/// Returned by [`Deadline::race`] when the deadline wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline exceeded")]
pub struct DeadlineExceeded;

#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    cancelled: watch::Receiver<bool>,
}

/// Owner side of a deadline. Dropping it cancels every derived deadline.
#[derive(Debug)]
pub struct DeadlineGuard {
    tx: watch::Sender<bool>,
}

impl Deadline {
    /// Create a deadline `budget` from now, together with its guard.
    pub fn after(budget: Duration) -> (Self, DeadlineGuard) {
        let (tx, cancelled) = watch::channel(false);
        let deadline = Self {
            at: Instant::now() + budget,
            cancelled,
        };
        (deadline, DeadlineGuard { tx })
    }

    pub fn at(&self) -> Instant {
        self.at
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        *self.cancelled.borrow() || Instant::now() >= self.at
    }

    /// Derive a deadline that fires after `limit` or with the parent,
    /// whichever is sooner. Cancellation is shared with the parent.
    pub fn child(&self, limit: Duration) -> Self {
        Self {
            at: self.at.min(Instant::now() + limit),
            cancelled: self.cancelled.clone(),
        }
    }

    /// Resolves once the deadline passes or is cancelled.
    pub async fn expired(&self) {
        tokio::select! {
            _ = sleep_until(self.at) => {}
            _ = wait_cancelled(self.cancelled.clone()) => {}
        }
    }

    /// Run `fut` until it completes or the deadline fires. On expiry the
    /// future is dropped; anything it spawned keeps running on its own.
    pub async fn race<F: Future>(&self, fut: F) -> Result<F::Output, DeadlineExceeded> {
        tokio::select! {
            biased;
            out = fut => Ok(out),
            _ = self.expired() => Err(DeadlineExceeded),
        }
    }
}

/// Resolves once the guard signals cancellation or is gone.
async fn wait_cancelled(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

impl DeadlineGuard {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}
