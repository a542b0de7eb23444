//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → resolve wait_for_signal()
//!
//! Shutdown (shutdown.rs):
//!     trigger() → cancel root token → every child token (retry waits) cancels
//! ```
//!
//! # Design Decisions
//! - One root cancellation token per process
//! - Retry operations get child tokens so cancelling one never cancels the root
//! - Triggering is idempotent

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
