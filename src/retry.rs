//! Retry policy and backoff.
//!
//! A failed attempt is classified into one of three dispositions: retry
//! against the same base URL, skip to the next base URL, or stop the whole
//! dispatch.

use crate::{AttemptError, Method};

/// Decides which failures are retried.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Replay POST against the same base URL. Without it a POST is only
    /// replayed when the connection was refused, an HTTP error response moves
    /// on to the next base URL, and a timeout or dropped connection stops the
    /// dispatch.
    pub retry_non_idempotent: bool,
    /// Retry 4xx responses (other than 404, 408 and 429) against the same
    /// base URL.
    pub retry_client_errors: bool,
}

impl RetryPolicy {
    /// Retries every failure on every method.
    pub fn indiscriminate() -> Self {
        Self {
            retry_non_idempotent: true,
            retry_client_errors: true,
        }
    }

    pub(crate) fn classify(&self, method: Method, err: &AttemptError) -> Disposition {
        if !method.is_idempotent() && !self.retry_non_idempotent {
            return match err {
                _ if err.never_sent() => Disposition::Retry,
                AttemptError::Http { .. } => Disposition::NextCandidate,
                AttemptError::Timeout { .. } | AttemptError::Network { .. } => Disposition::Stop,
            };
        }
        match err {
            AttemptError::Http { status, .. }
                if is_client_error(*status) && !self.retry_client_errors =>
            {
                Disposition::NextCandidate
            }
            _ => Disposition::Retry,
        }
    }
}

/// What to do after a failed attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Disposition {
    Retry,
    NextCandidate,
    Stop,
}

// 404 stays retryable: the API-prefixed and direct base URLs route differently.
fn is_client_error(status: u16) -> bool {
    (400..500).contains(&status) && !matches!(status, 404 | 408 | 429)
}

/// Linear backoff after the `attempt`-th (1-based) failed attempt.
pub(crate) fn backoff_delay_ms(base_ms: u64, attempt: usize) -> u64 {
    base_ms.saturating_mul(attempt as u64)
}
