//! Configuration schema definitions.
//!
//! This module defines the declarative description of a set of circuit
//! breakers. All types derive Serde traits for deserialization from TOML.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::{
    AlwaysTrip, BreakerOptions, CircuitState, ConsecutiveFailures, FailureRate, TripStrategy,
};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResiliencyConfig {
    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Settings every breaker starts from.
    pub defaults: BreakerConfig,

    /// Named breakers; each field left out falls back to `defaults`.
    pub breakers: BTreeMap<String, BreakerOverrides>,
}

impl ResiliencyConfig {
    /// Effective settings for a named breaker (`defaults` when unnamed).
    pub fn breaker_settings(&self, name: &str) -> BreakerConfig {
        match self.breakers.get(name) {
            Some(overrides) => overrides.apply(&self.defaults),
            None => self.defaults.clone(),
        }
    }
}

/// Full settings of one breaker.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// State a new breaker starts in.
    pub initial_state: CircuitState,

    /// Default cooldown in milliseconds.
    pub cooldown_ms: u64,

    /// Half-open successes that must be exceeded before closing.
    pub half_open_success_threshold: u32,

    /// Probe calls admitted at once while half-open.
    pub half_open_max_probes: u32,

    /// Trip strategy.
    pub strategy: StrategyConfig,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            initial_state: CircuitState::Closed,
            cooldown_ms: 30_000,
            half_open_success_threshold: 1,
            half_open_max_probes: 1,
            strategy: StrategyConfig::Always,
        }
    }
}

impl BreakerConfig {
    /// Runtime options for these settings.
    pub fn options(&self) -> BreakerOptions {
        BreakerOptions {
            initial_state: self.initial_state,
            default_cooldown: Duration::from_millis(self.cooldown_ms),
            half_open_success_threshold: self.half_open_success_threshold,
            half_open_max_probes: self.half_open_max_probes,
        }
    }
}

/// Per-breaker overrides of [`BreakerConfig`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerOverrides {
    pub initial_state: Option<CircuitState>,
    pub cooldown_ms: Option<u64>,
    pub half_open_success_threshold: Option<u32>,
    pub half_open_max_probes: Option<u32>,
    pub strategy: Option<StrategyConfig>,
}

impl BreakerOverrides {
    fn apply(&self, defaults: &BreakerConfig) -> BreakerConfig {
        BreakerConfig {
            initial_state: self.initial_state.unwrap_or(defaults.initial_state),
            cooldown_ms: self.cooldown_ms.unwrap_or(defaults.cooldown_ms),
            half_open_success_threshold: self
                .half_open_success_threshold
                .unwrap_or(defaults.half_open_success_threshold),
            half_open_max_probes: self
                .half_open_max_probes
                .unwrap_or(defaults.half_open_max_probes),
            strategy: self
                .strategy
                .clone()
                .unwrap_or_else(|| defaults.strategy.clone()),
        }
    }
}

/// Built-in trip strategies selectable from configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Every failure trips.
    #[default]
    Always,

    /// Trip on the N-th consecutive failure.
    ConsecutiveFailures { threshold: u32 },

    /// Trip when the failure ratio over a rolling window reaches `threshold`.
    FailureRate {
        window_ms: u64,
        minimum_calls: u32,
        threshold: f64,
    },
}

impl StrategyConfig {
    /// Instantiate the strategy.
    pub fn build(&self) -> Box<dyn TripStrategy> {
        match *self {
            StrategyConfig::Always => Box::new(AlwaysTrip),
            StrategyConfig::ConsecutiveFailures { threshold } => {
                Box::new(ConsecutiveFailures::new(threshold))
            }
            StrategyConfig::FailureRate {
                window_ms,
                minimum_calls,
                threshold,
            } => Box::new(FailureRate::new(
                Duration::from_millis(window_ms),
                minimum_calls,
                threshold,
            )),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
