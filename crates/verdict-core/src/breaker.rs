//! Circuit breaker — one instance per external service (embedding, LLM, store).
//!
//! Three states (`closed`/`open`/`half_open`) guarding a small struct behind a
//! `parking_lot::Mutex`, grounded on the teacher pack's
//! `harborgrid-justin-caddy/src/api/gateway.rs` `CircuitBreaker`, adapted from HTTP-gateway
//! semantics to the embedding/LLM/store breakers named in §4.5 and §6. Read-only state queries
//! are lock-free in spirit (a single short-lived lock, never held across I/O).

use std::time::Instant;

use parking_lot::Mutex;

use crate::config::BreakerConfig;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation; calls pass through.
    Closed,
    /// All calls rejected until `recovery_timeout` elapses.
    Open,
    /// A bounded number of probe calls are admitted to test recovery.
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_admitted: u32,
    half_open_failed: bool,
    opened_at: Option<Instant>,
}

/// Rejection returned when the breaker is open (or when a half-open probe slot is exhausted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("circuit breaker is open")]
pub struct BreakerOpen;

/// A three-state circuit breaker guarding calls to one external service.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
    name: &'static str,
}

impl CircuitBreaker {
    /// Construct a new breaker, starting `closed`.
    pub fn new(name: &'static str, config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_admitted: 0,
                half_open_failed: false,
                opened_at: None,
            }),
            name,
        }
    }

    /// Current state, performing the `open -> half_open` timeout transition if due.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.maybe_transition_to_half_open(&mut inner);
        inner.state
    }

    fn maybe_transition_to_half_open(&self, inner: &mut Inner) {
        if inner.state == CircuitState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    tracing::info!(service = self.name, "circuit breaker transitioning to half_open");
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_admitted = 0;
                    inner.half_open_failed = false;
                }
            }
        }
    }

    /// Whether a call may proceed right now. Admits at most `half_open_max_calls` probes while
    /// half-open; all other calls in that state, and all calls while open, are rejected.
    pub fn try_acquire(&self) -> Result<(), BreakerOpen> {
        let mut inner = self.inner.lock();
        self.maybe_transition_to_half_open(&mut inner);
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => Err(BreakerOpen),
            CircuitState::HalfOpen => {
                if inner.half_open_admitted < self.config.half_open_max_calls {
                    inner.half_open_admitted += 1;
                    Ok(())
                } else {
                    Err(BreakerOpen)
                }
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                if !inner.half_open_failed && inner.half_open_admitted >= self.config.half_open_max_calls {
                    tracing::info!(service = self.name, "circuit breaker transitioning to closed");
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.opened_at = None;
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        service = self.name,
                        failures = inner.consecutive_failures,
                        "circuit breaker transitioning to open"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(service = self.name, "half-open probe failed; reopening circuit");
                inner.half_open_failed = true;
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_failures = self.config.failure_threshold;
            }
            CircuitState::Open => {}
        }
    }
}
