//! Named circuit breaker registry.
//!
//! # Responsibilities
//! - Hand every call site protecting the same dependency the same breaker
//! - Create breakers on first use, exactly once per key
//!
//! # Design Decisions
//! - Explicit object built once at startup and passed by reference (no global)
//! - Sharded concurrent map: lookups never take a registry-wide lock
//! - Factories run in a per-key once-cell, outside the map's shard locks
//! - Breakers live as long as the registry; there is no unregister

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::config::ResiliencyConfig;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::types::RegistryError;

/// Per-key cell; the map entry exists before the breaker does.
type Slot = Arc<OnceCell<Arc<CircuitBreaker>>>;

/// Keyed collection of shared circuit breakers.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Slot>,
}

impl BreakerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with every breaker named in `config`.
    pub fn from_config(config: &ResiliencyConfig) -> Self {
        let registry = Self::new();
        for name in config.breakers.keys() {
            let settings = config.breaker_settings(name);
            registry.get_or_create(name, || {
                CircuitBreaker::from_boxed(settings.strategy.build(), settings.options())
            });
        }
        registry
    }

    /// Look up a registered breaker.
    ///
    /// # Errors
    ///
    /// [`RegistryError::KeyNotFound`] if nothing is registered under `key`.
    pub fn get(&self, key: &str) -> Result<Arc<CircuitBreaker>, RegistryError> {
        self.breakers
            .get(key)
            .and_then(|slot| slot.value().get().cloned())
            .ok_or_else(|| RegistryError::KeyNotFound {
                key: key.to_string(),
            })
    }

    /// Return the breaker for `key`, creating it with `factory` on first use.
    ///
    /// The factory runs at most once per key, even when many callers race on
    /// the first access; every caller gets the same instance. It runs outside
    /// the map's locks, so it may use the registry for other keys. Asking for
    /// the same key from inside its own factory deadlocks.
    pub fn get_or_create<F>(&self, key: &str, factory: F) -> Arc<CircuitBreaker>
    where
        F: FnOnce() -> CircuitBreaker,
    {
        let slot = self.slot(key);

        let mut created = false;
        let breaker = slot.get_or_init(|| {
            created = true;
            Arc::new(factory())
        });
        if created {
            tracing::debug!(key, "Circuit breaker created");
        }
        Arc::clone(breaker)
    }

    /// Register a breaker under `key`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateKey`] if the key is already taken; the
    /// existing breaker is left in place.
    pub fn register(
        &self,
        key: &str,
        breaker: CircuitBreaker,
    ) -> Result<Arc<CircuitBreaker>, RegistryError> {
        let breaker = Arc::new(breaker);
        match self.slot(key).set(Arc::clone(&breaker)) {
            Ok(()) => {
                tracing::debug!(key, "Circuit breaker registered");
                Ok(breaker)
            }
            Err(_) => Err(RegistryError::DuplicateKey {
                key: key.to_string(),
            }),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.breakers
            .get(key)
            .is_some_and(|slot| slot.value().get().is_some())
    }

    pub fn len(&self) -> usize {
        self.breakers.iter().filter(|r| r.value().get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .breakers
            .iter()
            .filter(|r| r.value().get().is_some())
            .map(|r| r.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Administrative reset of every registered breaker.
    pub fn reset_all(&self) {
        let mut count = 0usize;
        for entry in self.breakers.iter() {
            if let Some(breaker) = entry.value().get() {
                breaker.reset();
                count += 1;
            }
        }
        tracing::info!(count, "All circuit breakers reset");
    }

    /// Cell for `key`, inserted empty on first sight. No map lock is held
    /// once this returns.
    fn slot(&self, key: &str) -> Slot {
        if let Some(slot) = self.breakers.get(key) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.breakers.entry(key.to_string()).or_default().value())
    }
}
