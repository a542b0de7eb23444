//! Guarded calls through a circuit breaker.
//!
//! # Responsibilities
//! - Admit or short-circuit a call before it reaches the dependency
//! - Report the outcome back to the breaker
//! - Log state changes the call caused
//!
//! # Design Decisions
//! - Logging lives here, not in the state machine
//! - A failure that trips the breaker is returned as `Broken`, so callers
//!   stop retrying immediately
//! - A half-open probe dropped before completion gives its slot back

use std::future::Future;

use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::types::{CallError, CircuitState, Failure};

/// Half-Open probe slot held for the duration of one call.
struct ProbeSlot<'a> {
    breaker: &'a CircuitBreaker,
    held: bool,
}

impl ProbeSlot<'_> {
    /// The outcome was reported; the breaker already accounted for the slot.
    fn reported(mut self) {
        self.held = false;
    }
}

impl Drop for ProbeSlot<'_> {
    fn drop(&mut self) {
        if self.held {
            tracing::debug!("Half-open probe abandoned, releasing slot");
            self.breaker.release_probe();
        }
    }
}

impl CircuitBreaker {
    /// Execute an operation through the breaker.
    ///
    /// 1. Ask [`try_acquire`](CircuitBreaker::try_acquire); reject with
    ///    [`CallError::Broken`] while open
    /// 2. Run the operation
    /// 3. Report success, or report the failure and return `Broken` if it
    ///    tripped the breaker, `Inner` otherwise
    ///
    /// # Errors
    ///
    /// [`CallError::Broken`] when the call was short-circuited or tripped the
    /// breaker, [`CallError::Inner`] when the operation failed on its own.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Clone + Send + Sync + 'static,
    {
        let admitted = match self.try_acquire() {
            Ok(state) => state,
            Err(broken) => {
                tracing::debug!(
                    retry_after_ms = broken.retry_after().map(|d| d.as_millis() as u64),
                    "Circuit open, call rejected"
                );
                return Err(CallError::Broken(broken));
            }
        };

        if admitted == CircuitState::HalfOpen {
            tracing::debug!("Circuit half-open, probing dependency");
        }
        let slot = ProbeSlot {
            breaker: self,
            held: admitted == CircuitState::HalfOpen,
        };

        let outcome = operation().await;
        slot.reported();

        match outcome {
            Ok(value) => {
                let state = self.report_success();
                if admitted == CircuitState::HalfOpen && state == CircuitState::Closed {
                    tracing::info!("Circuit breaker closed, normal operation resumed");
                }
                Ok(value)
            }
            Err(error) => match self.report_failure(Failure::new(error.clone())) {
                Ok(()) => Err(CallError::Inner(error)),
                Err(broken) => {
                    if broken.retry_after().is_some() {
                        tracing::warn!(
                            error = %error,
                            cooldown_ms = broken.retry_after().map(|d| d.as_millis() as u64),
                            "Circuit breaker opened due to failures"
                        );
                    }
                    Err(CallError::Broken(broken))
                }
            },
        }
    }
}
