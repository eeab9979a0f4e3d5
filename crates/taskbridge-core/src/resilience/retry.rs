//! Retry policy: decides whether to retry a classified failure and how long to wait.

use std::time::Duration;

use rand::Rng;

use crate::domain::{ErrorKind, ToolError};

/// Predicate deciding whether a classified failure is worth another attempt.
pub type ShouldRetry = fn(&ToolError) -> bool;

/// Retry policy for a single remote call.
///
/// Counters live in the call itself; a policy is plain configuration and can
/// be shared freely.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,

    /// Base delay for the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Upper bound for a single delay.
    pub max_delay: Duration,

    /// Scale each delay by a random factor in `[0.5, 1.0]`.
    pub jitter: bool,

    pub should_retry: ShouldRetry,
}

/// Credentials can be rejected transiently (token refresh races) and the
/// network can blip; everything else is final.
pub fn retry_auth_and_connectivity(error: &ToolError) -> bool {
    matches!(error.kind(), ErrorKind::Authentication | ErrorKind::Connectivity)
}

/// A 401 means the request was refused before it had any effect, so it is
/// safe to retry even for non-idempotent calls.
pub fn retry_auth_only(error: &ToolError) -> bool {
    error.kind() == ErrorKind::Authentication
}

pub fn never_retry(_: &ToolError) -> bool {
    false
}

impl RetryPolicy {
    /// Default policy for secondary calls: 3 retries, 500ms → 1s → 2s.
    pub fn auth_aware() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            jitter: true,
            should_retry: retry_auth_and_connectivity,
        }
    }

    /// For calls that must not be repeated once the service has acted on them.
    pub fn non_idempotent() -> Self {
        Self {
            should_retry: retry_auth_only,
            ..Self::auth_aware()
        }
    }

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            should_retry: never_retry,
            ..Self::auth_aware()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate delay before the given retry.
    ///
    /// # Arguments
    /// * `retry` - The retry about to happen (1-indexed).
    ///
    /// delay = base_delay * multiplier^(retry - 1), capped at `max_delay`,
    /// then scaled by jitter when enabled.
    pub fn next_delay(&self, retry: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_secs = (base_secs * self.multiplier.powi(exponent))
            .min(self.max_delay.as_secs_f64());
        let delay_secs = if self.jitter && delay_secs > 0.0 {
            delay_secs * rand::thread_rng().gen_range(0.5..=1.0)
        } else {
            delay_secs
        };
        Duration::from_secs_f64(delay_secs)
    }
}
