//! Cancellable waits between retry attempts.
//!
//! # Responsibilities
//! - Suspend the calling task between attempts
//! - Abandon the wait as soon as the retry orchestration is cancelled
//! - Carry per-attempt context for whoever runs the retry loop
//!
//! # Design Decisions
//! - How many attempts and which backoff schedule belong to the caller
//! - The delay races the cancellation token; cancellation wins immediately
//! - Waiting yields the task, it never blocks a thread

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// The retry wait was abandoned because its token was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("retry wait cancelled")]
pub struct WaitCancelled;

/// Wait for `period`, or until `token` is cancelled.
///
/// # Errors
///
/// [`WaitCancelled`] if the token was cancelled before or during the wait.
pub async fn wait(period: Duration, token: &CancellationToken) -> Result<(), WaitCancelled> {
    if token.is_cancelled() {
        return Err(WaitCancelled);
    }

    tracing::trace!(delay_ms = period.as_millis() as u64, "Waiting before retry");

    tokio::select! {
        biased;
        _ = token.cancelled() => {
            tracing::debug!("Retry wait cancelled");
            Err(WaitCancelled)
        }
        _ = tokio::time::sleep(period) => Ok(()),
    }
}

/// [`wait`] with the period given in milliseconds.
///
/// # Errors
///
/// [`WaitCancelled`] if the token was cancelled before or during the wait.
pub async fn wait_millis(milliseconds: u64, token: &CancellationToken) -> Result<(), WaitCancelled> {
    wait(Duration::from_millis(milliseconds), token).await
}

/// Attempt context of the handler currently retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryHandlerInfo {
    /// Name of the retry handler (usually the protected dependency).
    pub name: String,
    /// 1-based attempt number within this handler.
    pub attempt: u32,
}

/// Totals across the whole retry orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTotalInfo {
    /// Attempts made so far, across handlers.
    pub attempts: u32,
    /// When the first attempt started.
    pub started_at: Instant,
}

impl RetryTotalInfo {
    pub fn new(started_at: Instant) -> Self {
        Self {
            attempts: 0,
            started_at,
        }
    }

    /// Time since the first attempt started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// What a retry orchestrator hands each attempt.
#[derive(Debug, Clone)]
pub struct RetryOperation {
    handler: RetryHandlerInfo,
    total: RetryTotalInfo,
    cancellation: CancellationToken,
}

impl RetryOperation {
    pub fn new(handler: RetryHandlerInfo, total: RetryTotalInfo, cancellation: CancellationToken) -> Self {
        Self {
            handler,
            total,
            cancellation,
        }
    }

    pub fn handler(&self) -> &RetryHandlerInfo {
        &self.handler
    }

    pub fn total(&self) -> &RetryTotalInfo {
        &self.total
    }

    /// Token that cancels this operation's waits.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Context for the next attempt of the same handler.
    pub fn next_attempt(&self) -> Self {
        let mut next = self.clone();
        next.handler.attempt = next.handler.attempt.saturating_add(1);
        next.total.attempts = next.total.attempts.saturating_add(1);
        next
    }

    /// Wait for `period` unless this operation is cancelled first.
    ///
    /// # Errors
    ///
    /// [`WaitCancelled`] if the operation was cancelled.
    pub async fn wait(&self, period: Duration) -> Result<(), WaitCancelled> {
        tracing::debug!(
            handler = %self.handler.name,
            attempt = self.handler.attempt,
            delay_ms = period.as_millis() as u64,
            "Retrying after delay"
        );
        wait(period, &self.cancellation).await
    }

    /// [`RetryOperation::wait`] with the period given in milliseconds.
    ///
    /// # Errors
    ///
    /// [`WaitCancelled`] if the operation was cancelled.
    pub async fn wait_millis(&self, milliseconds: u64) -> Result<(), WaitCancelled> {
        self.wait(Duration::from_millis(milliseconds)).await
    }
}
