//! Circuit breaker guarding the node: Closed → Open → Half-Open.
//!
//! - `Closed` → `Open` after `failure_threshold` consecutive failures
//! - `Open` → `Half-Open` once `open_duration` has elapsed
//! - `Half-Open` → `Closed` after `success_threshold` successful probes
//! - `Half-Open` → `Open` on any failed probe

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening.
    pub failure_threshold: u32,
    /// How long to reject requests before probing again.
    pub open_duration: Duration,
    /// Successful probes needed to close again.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(10),
            success_threshold: 1,
        }
    }
}

#[derive(Debug)]
struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    probe_successes: u32,
    opened_at: Option<Instant>,
}

impl Breaker {
    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.probe_successes = 0;
    }
}

/// Thread-safe circuit breaker shared by every caller of one node.
#[derive(Clone)]
pub struct CircuitBreaker {
    label: String,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<Breaker>>,
}

impl CircuitBreaker {
    /// Create a closed breaker; `label` identifies the node in logs.
    pub fn new(label: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            label: label.into(),
            config,
            inner: Arc::new(Mutex::new(Breaker {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                probe_successes: 0,
                opened_at: None,
            })),
        }
    }

    /// Current state; an expired `Open` becomes `HalfOpen` here.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == CircuitState::Open {
            let expired = inner
                .opened_at
                .map_or(true, |at| at.elapsed() >= self.config.open_duration);
            if expired {
                inner.state = CircuitState::HalfOpen;
                inner.probe_successes = 0;
                tracing::info!(node = %self.label, "Circuit breaker → half-open");
            }
        }
        inner.state
    }

    pub fn is_allowed(&self) -> bool {
        self.state() != CircuitState::Open
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.probe_successes += 1;
                if inner.probe_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.probe_successes = 0;
                    inner.opened_at = None;
                    tracing::info!(node = %self.label, "Circuit breaker → closed");
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.open();
                    tracing::warn!(
                        node = %self.label,
                        failures = inner.consecutive_failures,
                        "Circuit breaker → open"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.open();
                tracing::warn!(node = %self.label, "Circuit breaker probe failed → open");
            }
            CircuitState::Open => {}
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("node", &self.label)
            .field("state", &self.state())
            .finish()
    }
}
