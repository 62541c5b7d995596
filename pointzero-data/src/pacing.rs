//! Fixed-delay throttling around provider calls.
//!
//! Public APIs rate-limit aggressively, so every provider call is wrapped in
//! a short wait before and a longer one after. Waiting goes through the
//! [`Delay`] trait so tests can record the schedule instead of sleeping.

use std::{future::Future, time::Duration};

use async_trait::async_trait;

/// Default wait before each provider call.
pub const DEFAULT_BEFORE: Duration = Duration::from_millis(500);
/// Default wait after each provider call.
pub const DEFAULT_AFTER: Duration = Duration::from_millis(1000);

/// Suspends the current task.
#[async_trait(?Send)]
pub trait Delay {
    /// Wait for `duration`.
    async fn wait(&self, duration: Duration);
}

/// [`Delay`] backed by the Tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDelay;

#[async_trait(?Send)]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Waits applied around each provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Wait before the call.
    pub before: Duration,
    /// Wait after the call.
    pub after: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            before: DEFAULT_BEFORE,
            after: DEFAULT_AFTER,
        }
    }
}

impl PacingPolicy {
    /// No waiting at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            before: Duration::ZERO,
            after: Duration::ZERO,
        }
    }

    /// Run `call` between the configured waits.
    pub async fn around<F>(&self, delay: &dyn Delay, call: F) -> F::Output
    where
        F: Future,
    {
        delay.wait(self.before).await;
        let output = call.await;
        delay.wait(self.after).await;
        output
    }
}
