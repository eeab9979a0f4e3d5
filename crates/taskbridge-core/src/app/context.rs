//! Explicit per-workflow context: the remote service, the clock, retry
//! policies, and the optional circuit breaker.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::ToolError;
use crate::ports::{Clock, RemoteError, TaskService};
use crate::resilience::{self, CircuitBreaker, RetryPolicy};

/// Retry policies by call category.
#[derive(Debug, Clone)]
pub struct RetryPolicies {
    /// Reads and idempotent writes (get, update, set labels, assignees, relations).
    pub standard: RetryPolicy,
    /// Creating the base task: retried only when the service refused it outright.
    pub non_idempotent: RetryPolicy,
    /// Lookups whose failure is tolerated (pre-fetch before delete).
    pub best_effort: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            standard: RetryPolicy::auth_aware(),
            non_idempotent: RetryPolicy::non_idempotent(),
            best_effort: RetryPolicy::none(),
        }
    }
}

impl RetryPolicies {
    pub(crate) fn named(&self) -> [(&'static str, &RetryPolicy); 3] {
        [
            ("standard", &self.standard),
            ("non_idempotent", &self.non_idempotent),
            ("best_effort", &self.best_effort),
        ]
    }
}

/// Passed into every workflow; nothing here is ambient or global.
#[derive(Clone)]
pub struct ServiceContext {
    service: Arc<dyn TaskService>,
    clock: Arc<dyn Clock>,
    policies: RetryPolicies,
    breaker: Option<Arc<CircuitBreaker>>,
}

impl ServiceContext {
    pub(crate) fn new(
        service: Arc<dyn TaskService>,
        clock: Arc<dyn Clock>,
        policies: RetryPolicies,
        breaker: Option<Arc<CircuitBreaker>>,
    ) -> Self {
        Self {
            service,
            clock,
            policies,
            breaker,
        }
    }

    pub fn service(&self) -> &dyn TaskService {
        self.service.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn policies(&self) -> &RetryPolicies {
        &self.policies
    }

    /// Remote call with the standard policy.
    pub async fn call<T, F, Fut>(&self, step: &str, operation: F) -> Result<T, ToolError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        self.call_with(step, &self.policies.standard, operation).await
    }

    pub async fn call_with<T, F, Fut>(
        &self,
        step: &str,
        policy: &RetryPolicy,
        operation: F,
    ) -> Result<T, ToolError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        resilience::call(step, policy, self.breaker.as_deref(), operation).await
    }
}
