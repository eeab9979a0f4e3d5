//! Resilient call wrapper: one remote invocation, bounded retry, optional breaker.

use std::future::Future;

use super::breaker::CircuitBreaker;
use super::classify::classify;
use super::retry::RetryPolicy;
use crate::domain::ToolError;
use crate::ports::RemoteError;

/// Execute `operation`, classifying each failure once and retrying while the
/// policy allows.
///
/// - Errors the policy does not retry propagate immediately, unmodified.
/// - When the retry budget runs out, the last error keeps its kind and gains
///   a retry-count annotation.
pub async fn call<T, F, Fut>(
    step: &str,
    policy: &RetryPolicy,
    breaker: Option<&CircuitBreaker>,
    mut operation: F,
) -> Result<T, ToolError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut retries = 0;

    loop {
        if let Some(breaker) = breaker {
            breaker.check(step)?;
        }

        let error = match operation().await {
            Ok(value) => {
                if let Some(breaker) = breaker {
                    breaker.record_success();
                }
                if retries > 0 {
                    tracing::info!("'{}' succeeded after {} retries", step, retries);
                }
                return Ok(value);
            }
            Err(raw) => classify(raw, step),
        };

        if let Some(breaker) = breaker {
            breaker.record_failure(&error);
        }

        if !(policy.should_retry)(&error) {
            tracing::debug!("'{}' failed (not retryable): {}", step, error);
            return Err(error);
        }

        if retries >= policy.max_retries {
            tracing::error!("'{}' failed after {} retries: {}", step, retries, error);
            return Err(error.with_retries(step, retries));
        }

        retries += 1;
        let delay = policy.next_delay(retries);
        tracing::warn!(
            "'{}' failed with {}, retry {}/{} in {:?}",
            step,
            error.kind(),
            retries,
            policy.max_retries,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}
