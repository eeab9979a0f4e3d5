//! Circuit breaker for connectivity failures.
//!
//! Closed → (threshold consecutive connectivity failures) → Open
//! Open → (cooldown elapsed) → HalfOpen → one probe → Closed or Open again.
//!
//! Only connectivity failures count: any answer from the service, even an
//! error status, proves it is reachable and closes the breaker.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::domain::{ErrorKind, ToolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed { failures: u32 },
    Open { until: Instant },
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            state: Mutex::new(BreakerState::Closed { failures: 0 }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        // The state is a plain value; a poisoned lock still holds a usable one.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fails fast while the breaker is open.
    pub fn check(&self, step: &str) -> Result<(), ToolError> {
        let mut state = self.lock();
        match *state {
            BreakerState::Open { until } if Instant::now() < until => Err(ToolError::Connectivity {
                message: format!(
                    "not attempting to {step}: the task service has been unreachable for several \
                     consecutive calls; retry after {}s",
                    until.saturating_duration_since(Instant::now()).as_secs().max(1)
                ),
            }),
            BreakerState::Open { .. } => {
                tracing::info!("circuit breaker half-open, probing with '{}'", step);
                *state = BreakerState::HalfOpen;
                Ok(())
            }
            BreakerState::Closed { .. } | BreakerState::HalfOpen => Ok(()),
        }
    }

    pub fn record_success(&self) {
        *self.lock() = BreakerState::Closed { failures: 0 };
    }

    pub fn record_failure(&self, error: &ToolError) {
        let mut state = self.lock();
        if error.kind() != ErrorKind::Connectivity {
            *state = BreakerState::Closed { failures: 0 };
            return;
        }
        let next = match *state {
            BreakerState::Closed { failures } if failures + 1 < self.threshold => {
                BreakerState::Closed {
                    failures: failures + 1,
                }
            }
            _ => {
                tracing::warn!(
                    "circuit breaker open for {:?} after connectivity failure: {}",
                    self.cooldown,
                    error
                );
                BreakerState::Open {
                    until: Instant::now() + self.cooldown,
                }
            }
        };
        *state = next;
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.lock(), BreakerState::Open { until } if Instant::now() < until)
    }
}
