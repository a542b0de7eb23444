//! Circuit breaker options.

use std::time::Duration;

use crate::resilience::types::CircuitState;

/// Immutable breaker configuration.
///
/// Shared by `Arc` between a breaker and whoever built it (for example the
/// registry when it creates breakers from configuration).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerOptions {
    /// State a new breaker starts in.
    pub initial_state: CircuitState,

    /// Cooldown applied when a trip does not name one.
    pub default_cooldown: Duration,

    /// A half-open breaker closes once its success count exceeds this value.
    pub half_open_success_threshold: u32,

    /// Probe calls admitted at once while Half-Open.
    pub half_open_max_probes: u32,
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            initial_state: CircuitState::Closed,
            default_cooldown: Duration::from_secs(30),
            half_open_success_threshold: 1,
            half_open_max_probes: 1,
        }
    }
}

impl BreakerOptions {
    /// Options with a different default cooldown.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.default_cooldown = cooldown;
        self
    }

    /// Options with a different half-open success threshold.
    pub fn with_half_open_success_threshold(mut self, threshold: u32) -> Self {
        self.half_open_success_threshold = threshold;
        self
    }

    /// Options admitting up to `probes` concurrent calls while Half-Open.
    pub fn with_half_open_max_probes(mut self, probes: u32) -> Self {
        self.half_open_max_probes = probes;
        self
    }

    /// Options with a different initial state.
    pub fn with_initial_state(mut self, state: CircuitState) -> Self {
        self.initial_state = state;
        self
    }
}
