//! # Circuit Breaker Module
//!
//! Per-provider circuit breaker protecting callers from consistently failing
//! upstreams. Unlike a wrapping breaker, this one does not execute the
//! operation itself: the router core asks [`CircuitBreaker::is_available`]
//! before each attempt and reports every outcome back exactly once through
//! [`CircuitBreaker::record_success`] / [`CircuitBreaker::record_failure`].
//!
//! ## States
//!
//! - **Closed**: all calls permitted. Consecutive failures are counted; when
//!   the count reaches the threshold the breaker opens and schedules the next
//!   attempt time.
//! - **Open**: calls blocked. Once the cool-down elapses, the next
//!   availability check transitions to half-open and lets a probe through.
//! - **HalfOpen**: calls permitted. A success closes the breaker and resets
//!   the failure count; a failure re-opens it with a fresh cool-down.
//!
//! Defaults: threshold 5 consecutive failures, cool-down 60 seconds.
//!
//! State and `next_attempt_time` always change together under the same lock,
//! so readers may observe stale but never inconsistent state.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Circuit breaker operational states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - calls are allowed
    Closed,
    /// Failure threshold reached - calls are blocked
    Open,
    /// Testing recovery - calls are allowed
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time to wait before letting a probe through an open circuit
    pub cool_down_secs: u64,
}

impl CircuitBreakerConfig {
    pub fn cool_down(&self) -> Duration {
        Duration::from_secs(self.cool_down_secs)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down_secs: 60,
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    next_attempt_time: Option<Instant>,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            next_attempt_time: None,
        }
    }
}

/// Read-only view of a breaker, for health endpoints and tests.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: &'static str,
    pub failure_count: u32,
    /// Seconds until the open circuit lets a probe through, if open
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in_secs: Option<u64>,
}

/// Per-provider circuit breaker state machine.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: RwLock<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: RwLock::new(BreakerState::default()),
        }
    }

    /// Check whether a call to this provider is currently permitted.
    ///
    /// An open circuit whose cool-down has elapsed transitions to half-open
    /// here and lets the call through as a recovery probe.
    pub async fn is_available(&self) -> bool {
        let mut state = self.state.write().await;

        match state.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let ready = state
                    .next_attempt_time
                    .is_some_and(|at| Instant::now() >= at);
                if ready {
                    state.state = CircuitState::HalfOpen;
                    state.next_attempt_time = None;
                    tracing::info!(
                        "circuit breaker {} transitioning to HALF-OPEN",
                        self.name
                    );
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Report a successful call outcome.
    pub async fn record_success(&self) {
        let mut state = self.state.write().await;

        match state.state {
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                state.state = CircuitState::Closed;
                state.failure_count = 0;
                state.next_attempt_time = None;
                tracing::info!("circuit breaker {} transitioning to CLOSED", self.name);
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened can still
                // complete; the count only resets on the CLOSED transition.
                tracing::debug!(
                    "circuit breaker {} saw a success while OPEN",
                    self.name
                );
            }
        }
    }

    /// Report a failed call outcome.
    pub async fn record_failure(&self) {
        let mut state = self.state.write().await;

        let now = Instant::now();
        state.failure_count += 1;
        state.last_failure_time = Some(now);

        match state.state {
            CircuitState::Closed => {
                if state.failure_count >= self.config.failure_threshold {
                    state.state = CircuitState::Open;
                    state.next_attempt_time = Some(now + self.config.cool_down());
                    tracing::warn!(
                        "circuit breaker {} transitioning to OPEN after {} failures",
                        self.name,
                        state.failure_count
                    );
                }
            }
            CircuitState::HalfOpen => {
                state.state = CircuitState::Open;
                state.next_attempt_time = Some(now + self.config.cool_down());
                tracing::warn!(
                    "circuit breaker {} probe failed, transitioning back to OPEN",
                    self.name
                );
            }
            CircuitState::Open => {}
        }
    }

    /// Current state without side effects.
    pub async fn state(&self) -> CircuitState {
        self.state.read().await.state
    }

    /// Current consecutive failure count.
    pub async fn failure_count(&self) -> u32 {
        self.state.read().await.failure_count
    }

    pub async fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state.read().await;
        let now = Instant::now();
        BreakerSnapshot {
            state: state.state.as_str(),
            failure_count: state.failure_count,
            retry_in_secs: match state.state {
                CircuitState::Open => state
                    .next_attempt_time
                    .map(|at| at.saturating_duration_since(now).as_secs()),
                _ => None,
            },
        }
    }
}
