//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to dependency:
//!     → registry.rs (look up the breaker shared by every caller of that dependency)
//!     → circuit_breaker.rs (admit, or fail fast with CircuitBroken while open)
//!     → guard.rs (run the call, report the outcome, log transitions)
//!     → strategy.rs (decide whether a failure opens the circuit)
//!     → On failure: retries.rs (cancellable wait before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Circuit broken is a returned value, never a panic
//! - Breaker state changes are lock-free compare-and-swap transitions
//! - Open → Half-Open is driven by callers; nothing runs a timer
//! - Retry count and backoff policy belong to the caller

pub mod circuit_breaker;
pub mod guard;
pub mod options;
pub mod registry;
pub mod retries;
pub mod strategy;
pub mod types;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker};
pub use options::BreakerOptions;
pub use registry::BreakerRegistry;
pub use retries::{wait, wait_millis, RetryHandlerInfo, RetryOperation, RetryTotalInfo, WaitCancelled};
pub use strategy::{AlwaysTrip, ConsecutiveFailures, FailureFilter, FailureRate, TripStrategy};
pub use types::{CallError, CircuitBroken, CircuitState, Failure, RegistryError};
