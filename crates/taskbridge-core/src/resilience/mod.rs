//! Resilience: retry policy, error classification, circuit breaking, and the
//! call wrapper that combines them.

mod breaker;
mod call;
mod classify;
mod retry;

pub use breaker::CircuitBreaker;
pub use call::call;
pub use classify::classify;
pub use retry::{
    RetryPolicy, ShouldRetry, never_retry, retry_auth_and_connectivity, retry_auth_only,
};
