//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! guard.rs / registry.rs / retries.rs / lifecycle:
//!     → tracing events (structured fields: breaker key, state, delay)
//!     → logging.rs subscriber (env filter → fmt layer → stdout)
//! ```
//!
//! # Design Decisions
//! - The breaker state machine emits nothing; callers around it log
//! - RUST_LOG wins over the configured level

pub mod logging;

pub use logging::init;
