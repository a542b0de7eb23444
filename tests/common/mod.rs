//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use resiliency::resilience::{BreakerOptions, CircuitBreaker, ConsecutiveFailures};

/// Error returned by the simulated dependency.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("dependency failed: {0}")]
pub struct DependencyError(pub &'static str);

/// Breaker that trips on the `threshold`-th consecutive failure.
pub fn consecutive_breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
    CircuitBreaker::new(
        ConsecutiveFailures::new(threshold),
        BreakerOptions::default().with_cooldown(cooldown),
    )
}

/// Dependency that fails its first `fail_first` calls, then succeeds.
#[derive(Clone)]
pub struct FlakyDependency {
    fail_first: u32,
    calls: Arc<AtomicU32>,
}

impl FlakyDependency {
    pub fn new(fail_first: u32) -> Self {
        Self {
            fail_first,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub async fn invoke(&self) -> Result<u32, DependencyError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.fail_first {
            Err(DependencyError("unavailable"))
        } else {
            Ok(call)
        }
    }

    /// Calls that actually reached the dependency.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}
