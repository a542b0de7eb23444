//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (cooldowns > 0, thresholds > 0, ratios in (0, 1])
//! - Validate the effective settings of every named breaker
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResiliencyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{BreakerConfig, ResiliencyConfig, StrategyConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("breaker name must not be empty")]
    EmptyName,

    #[error("{scope}: cooldown_ms must be greater than 0")]
    ZeroCooldown { scope: String },

    #[error("{scope}: half_open_success_threshold must be greater than 0")]
    ZeroSuccessThreshold { scope: String },

    #[error("{scope}: half_open_max_probes must be greater than 0")]
    ZeroMaxProbes { scope: String },

    #[error("{scope}: consecutive_failures threshold must be greater than 0")]
    ZeroFailureThreshold { scope: String },

    #[error("{scope}: failure_rate window_ms must be greater than 0")]
    ZeroWindow { scope: String },

    #[error("{scope}: failure_rate threshold {value} must be in (0, 1]")]
    RateOutOfRange { scope: String, value: f64 },
}

/// Check every breaker's effective settings.
pub fn validate_config(config: &ResiliencyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_breaker("defaults", &config.defaults, &mut errors);
    for name in config.breakers.keys() {
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyName);
            continue;
        }
        let scope = format!("breakers.{}", name);
        validate_breaker(&scope, &config.breaker_settings(name), &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_breaker(scope: &str, breaker: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    if breaker.cooldown_ms == 0 {
        errors.push(ValidationError::ZeroCooldown { scope: scope.to_string() });
    }
    if breaker.half_open_success_threshold == 0 {
        errors.push(ValidationError::ZeroSuccessThreshold { scope: scope.to_string() });
    }
    if breaker.half_open_max_probes == 0 {
        errors.push(ValidationError::ZeroMaxProbes { scope: scope.to_string() });
    }

    match breaker.strategy {
        StrategyConfig::Always => {}
        StrategyConfig::ConsecutiveFailures { threshold } => {
            if threshold == 0 {
                errors.push(ValidationError::ZeroFailureThreshold { scope: scope.to_string() });
            }
        }
        StrategyConfig::FailureRate { window_ms, threshold, .. } => {
            if window_ms == 0 {
                errors.push(ValidationError::ZeroWindow { scope: scope.to_string() });
            }
            if !(threshold > 0.0 && threshold <= 1.0) {
                errors.push(ValidationError::RateOutOfRange {
                    scope: scope.to_string(),
                    value: threshold,
                });
            }
        }
    }
}
