//! Bounded retry with linear backoff.

use std::time::Duration;

use thiserror::Error;

use super::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::pacing::Delay;

/// Retry budget and backoff step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait multiplied by the failed attempt's 1-based index.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Wait scheduled after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}

/// Why a single attempt was considered transient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptFailure {
    /// No HTTP status was obtained.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The gateway reported a transient failure.
    #[error("gateway returned status {status}")]
    Status {
        /// HTTP status code (502 or 504).
        status: u16,
    },
}

/// Errors surfaced by [`fetch_with_retry`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    /// Every attempt failed transiently.
    #[error("max retries exceeded for {url} after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Request URL.
        url: String,
        /// Attempts made.
        attempts: u32,
        /// Failure of the final attempt.
        #[source]
        last: AttemptFailure,
    },
}

const fn is_transient_status(status: u16) -> bool {
    matches!(status, 502 | 504)
}

/// Send `request`, retrying transport failures and 502/504 responses.
///
/// Any other status, success or not, is returned to the caller as-is. After
/// failed attempt `n` the call waits `n × backoff_step`; no wait follows the
/// final attempt.
///
/// # Errors
///
/// Returns [`RetryError::MaxRetriesExceeded`] once `max_attempts` attempts
/// have all failed transiently.
pub async fn fetch_with_retry(
    transport: &dyn Transport,
    delay: &dyn Delay,
    request: &HttpRequest,
    policy: &RetryPolicy,
) -> Result<HttpResponse, RetryError> {
    let attempts = policy.max_attempts.max(1);
    let mut last = None;
    for attempt in 1..=attempts {
        let failure = match transport.send(request).await {
            Ok(response) if !is_transient_status(response.status) => return Ok(response),
            Ok(response) => AttemptFailure::Status {
                status: response.status,
            },
            Err(error) => AttemptFailure::Transport(error),
        };
        log::warn!(
            "attempt {attempt}/{attempts} for {} failed: {failure}",
            request.url
        );
        last = Some(failure);
        if attempt < attempts {
            delay.wait(policy.backoff_for(attempt)).await;
        }
    }
    Err(RetryError::MaxRetriesExceeded {
        url: request.url.to_string(),
        attempts,
        last: last.unwrap_or(AttemptFailure::Status { status: 0 }),
    })
}
