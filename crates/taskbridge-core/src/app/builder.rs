//! ServiceContextBuilder - ワークフローに渡すコンテキストの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - グローバルな「現在のクライアント」を持たず、明示的に渡す

use std::sync::Arc;
use std::time::Duration;

use super::context::{RetryPolicies, ServiceContext};
use crate::ports::{Clock, SystemClock, TaskService};
use crate::resilience::{CircuitBreaker, RetryPolicy};

/// 実運用で意味のあるリトライ回数の上限
const MAX_SANE_RETRIES: u32 = 10;

/// ServiceContextBuilder は ServiceContext を構築
///
/// # 使用例
/// ```ignore
/// let ctx = ServiceContextBuilder::new()
///     .service(Arc::new(InMemoryTaskService::new()))
///     .circuit_breaker(5, Duration::from_secs(30))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - service が未設定なら BuildError::MissingService
/// - 不正なリトライ設定（multiplier < 1.0 など）は BuildError::InvalidPolicy
pub struct ServiceContextBuilder {
    service: Option<Arc<dyn TaskService>>,
    clock: Arc<dyn Clock>,
    policies: RetryPolicies,
    breaker: Option<(u32, Duration)>,
}

/// BuildError はコンテキスト構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no task service configured. Call .service(...) before .build()")]
    MissingService,

    #[error("invalid retry policy '{name}': {reason}")]
    InvalidPolicy { name: &'static str, reason: String },

    #[error("circuit breaker threshold must be at least 1")]
    InvalidBreaker,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self {
            service: None,
            clock: Arc::new(SystemClock),
            policies: RetryPolicies::default(),
            breaker: None,
        }
    }

    pub fn service(mut self, service: Arc<dyn TaskService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policies(mut self, policies: RetryPolicies) -> Self {
        self.policies = policies;
        self
    }

    /// Applies `f` to every policy, e.g. to shorten delays in tests.
    pub fn map_policies(mut self, f: impl Fn(RetryPolicy) -> RetryPolicy) -> Self {
        self.policies = RetryPolicies {
            standard: f(self.policies.standard),
            non_idempotent: f(self.policies.non_idempotent),
            best_effort: f(self.policies.best_effort),
        };
        self
    }

    pub fn circuit_breaker(mut self, threshold: u32, cooldown: Duration) -> Self {
        self.breaker = Some((threshold, cooldown));
        self
    }

    pub fn build(self) -> Result<ServiceContext, BuildError> {
        let service = self.service.ok_or(BuildError::MissingService)?;

        for (name, policy) in self.policies.named() {
            if policy.max_retries > MAX_SANE_RETRIES {
                return Err(BuildError::InvalidPolicy {
                    name,
                    reason: format!(
                        "max_retries {} exceeds {MAX_SANE_RETRIES}",
                        policy.max_retries
                    ),
                });
            }
            if !(policy.multiplier >= 1.0) {
                return Err(BuildError::InvalidPolicy {
                    name,
                    reason: format!("multiplier {} must be >= 1.0", policy.multiplier),
                });
            }
        }

        let breaker = match self.breaker {
            Some((0, _)) => return Err(BuildError::InvalidBreaker),
            Some((threshold, cooldown)) => Some(Arc::new(CircuitBreaker::new(threshold, cooldown))),
            None => None,
        };

        Ok(ServiceContext::new(service, self.clock, self.policies, breaker))
    }
}

impl Default for ServiceContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryTaskService;

    #[test]
    fn test_build_success() {
        let ctx = ServiceContextBuilder::new()
            .service(Arc::new(InMemoryTaskService::new()))
            .build();
        assert!(ctx.is_ok());
    }

    #[test]
    fn test_build_missing_service() {
        let ctx = ServiceContextBuilder::new().build();
        assert!(matches!(ctx, Err(BuildError::MissingService)));
    }

    #[test]
    fn test_build_rejects_shrinking_backoff() {
        let ctx = ServiceContextBuilder::new()
            .service(Arc::new(InMemoryTaskService::new()))
            .map_policies(|mut p| {
                p.multiplier = 0.5;
                p
            })
            .build();
        assert!(matches!(ctx, Err(BuildError::InvalidPolicy { name: "standard", .. })));
    }

    #[test]
    fn test_build_rejects_zero_threshold_breaker() {
        let ctx = ServiceContextBuilder::new()
            .service(Arc::new(InMemoryTaskService::new()))
            .circuit_breaker(0, Duration::from_secs(1))
            .build();
        assert!(matches!(ctx, Err(BuildError::InvalidBreaker)));
    }
}
