//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ResiliencyConfig (validated, immutable)
//!     → BreakerRegistry::from_config builds the named breakers
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Named breakers override `defaults` field by field
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{BreakerConfig, BreakerOverrides, ObservabilityConfig, ResiliencyConfig, StrategyConfig};
pub use validation::ValidationError;
