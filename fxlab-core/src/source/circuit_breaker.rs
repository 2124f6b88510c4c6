//! Circuit breaker for rate-provider throttling and hard blocks.
//!
//! A free-tier exchange-rate API will throttle aggressively and may block
//! a key outright. After a hard block (HTTP 403) or repeated failures, the
//! breaker opens and refuses requests for a cooldown period rather than
//! hammering the provider. Rate-limit push-back carries a retry-after
//! hint, and the breaker honors it: when throttling trips the breaker,
//! the provider's hint replaces the fixed cooldown.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// State of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation — requests are allowed.
    Closed,
    /// Tripped — all requests are refused until the deadline passes.
    Open { until: Instant },
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
}

/// Refuses requests for a cooldown window after the provider pushes back.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    /// Create a breaker with the given cooldown duration.
    pub fn new(cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: 3,
        }
    }

    /// Default breaker for the rate provider: 15-minute cooldown, trips
    /// after 3 consecutive failures.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(15 * 60))
    }

    /// Check if requests are currently allowed. An expired deadline
    /// closes the breaker and clears the failure count.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { until } => {
                if Instant::now() >= until {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful request — resets the failure counter.
    pub fn record_success(&self) {
        self.inner.lock().unwrap().consecutive_failures = 0;
    }

    /// Record a failure. At the threshold, the breaker opens for the
    /// fixed cooldown.
    pub fn record_failure(&self) {
        self.fail(self.cooldown);
    }

    /// Record a rate-limit push-back. At the threshold, the breaker
    /// opens for the provider's retry-after hint instead of the fixed
    /// cooldown.
    pub fn throttle(&self, retry_after: Duration) {
        self.fail(retry_after);
    }

    /// Immediately open the breaker (for a hard block / revoked key).
    pub fn trip(&self) {
        self.inner.lock().unwrap().state = BreakerState::Open {
            until: Instant::now() + self.cooldown,
        };
    }

    /// Remaining cooldown time (zero if not tripped).
    pub fn remaining_cooldown(&self) -> Duration {
        match self.inner.lock().unwrap().state {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { until } => until.saturating_duration_since(Instant::now()),
        }
    }

    fn fail(&self, open_for: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold {
            inner.state = BreakerState::Open {
                until: Instant::now() + open_for,
            };
        }
    }
}
