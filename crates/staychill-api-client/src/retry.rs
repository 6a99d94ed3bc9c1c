//! Retry policy with exponential backoff

use std::time::Duration;

use crate::error::{ApiError, ErrorKind};

const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_CAP_MS: u64 = 10_000;
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before retry number `attempt` (zero-based): 1s, 2s, 4s, ... capped
/// at 10s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.min(16);
    Duration::from_millis((BACKOFF_BASE_MS << exp).min(BACKOFF_CAP_MS))
}

/// How a dispatched request is retried after a failure
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Whether 401/403 responses are retried. The current-user probe turns
    /// this off: a 401 there is an expected outcome for anonymous visitors,
    /// not a transient fault.
    pub retry_unauthorized: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_unauthorized: true,
        }
    }
}

impl RetryPolicy {
    /// Policy for authentication probes: surface a 401 immediately.
    pub fn no_auth_retry() -> Self {
        Self {
            retry_unauthorized: false,
            ..Self::default()
        }
    }

    /// Disable retries entirely.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            retry_unauthorized: true,
        }
    }

    /// Whether to retry after `error`, given that `attempt` retries have
    /// already happened.
    pub fn should_retry(&self, error: &ApiError, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        if error.kind == ErrorKind::Unauthorized && !self.retry_unauthorized {
            return false;
        }
        true
    }
}
