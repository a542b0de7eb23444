//! Circuit breaking and cancellable retry waits for calls to unreliable
//! dependencies.

pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ResiliencyConfig;
pub use lifecycle::Shutdown;
pub use resilience::{BreakerRegistry, CircuitBreaker, CircuitBroken, CircuitState};
