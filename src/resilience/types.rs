//! Breaker state, failure values and error definitions.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow through to the dependency.
    #[default]
    Closed,
    /// Dependency assumed down; calls fail fast until the cooldown ends.
    Open,
    /// Cooldown over; probe calls decide whether the breaker closes again.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(name)
    }
}

/// A failure observed by a guarded call.
///
/// Type-erased and cheap to clone, so the breaker can keep the last one around
/// and hand it to every caller that gets short-circuited. Strategies can
/// [`downcast_ref`](Failure::downcast_ref) it to decide by concrete error type.
#[derive(Clone)]
pub struct Failure(Arc<dyn StdError + Send + Sync + 'static>);

impl Failure {
    /// Wrap a concrete error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Wrap an already boxed error.
    pub fn from_boxed(error: Box<dyn StdError + Send + Sync + 'static>) -> Self {
        Self(Arc::from(error))
    }

    /// Borrow the concrete error if it is a `T`.
    pub fn downcast_ref<T>(&self) -> Option<&T>
    where
        T: StdError + 'static,
    {
        self.0.downcast_ref::<T>()
    }

    /// Returns true if the concrete error is a `T`.
    pub fn is<T>(&self) -> bool
    where
        T: StdError + 'static,
    {
        self.0.is::<T>()
    }

    /// Borrow the underlying error.
    pub fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }

    /// Returns true if both values wrap the same error instance.
    pub fn ptr_eq(&self, other: &Failure) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<E> From<E> for Failure
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

/// Signal that the circuit is open and the current attempt must stop.
///
/// Returned by [`CircuitBreaker::trip`](super::CircuitBreaker::trip) whether the
/// breaker was just tripped or was already open, and by admission checks that
/// reject a call. Only a fresh trip or a rejection during cooldown carries a
/// `retry_after` hint; re-tripping an open breaker does not.
#[derive(Debug, Clone)]
pub struct CircuitBroken {
    failure: Option<Failure>,
    retry_after: Option<Duration>,
}

impl fmt::Display for CircuitBroken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("circuit broken")?;
        if let Some(after) = self.retry_after {
            write!(f, ", retry after {}ms", after.as_millis())?;
        }
        if let Some(failure) = &self.failure {
            write!(f, ": {}", failure)?;
        }
        Ok(())
    }
}

impl StdError for CircuitBroken {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.failure
            .as_ref()
            .map(|failure| failure.as_error() as &(dyn StdError + 'static))
    }
}

impl CircuitBroken {
    pub(crate) fn new(failure: Option<Failure>, retry_after: Option<Duration>) -> Self {
        Self {
            failure,
            retry_after,
        }
    }

    /// The failure that opened (or re-tripped) the circuit, if known.
    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    /// Time left until the cooldown ends, when known.
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

/// Errors from [`BreakerRegistry`](super::BreakerRegistry) lookups and registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No breaker is registered under the key.
    #[error("no circuit breaker registered with key: {key}")]
    KeyNotFound { key: String },

    /// A breaker is already registered under the key.
    #[error("a circuit breaker with key: {key} is already registered")]
    DuplicateKey { key: String },
}

/// Error returned by [`CircuitBreaker::call`](super::CircuitBreaker::call).
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// The breaker rejected the call, or the call's failure tripped it.
    #[error(transparent)]
    Broken(CircuitBroken),

    /// The call ran and failed without tripping the breaker.
    #[error(transparent)]
    Inner(E),
}

impl<E> CallError<E> {
    /// Returns true if the breaker short-circuited this call.
    pub fn is_broken(&self) -> bool {
        matches!(self, CallError::Broken(_))
    }
}
