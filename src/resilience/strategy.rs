//! Trip strategies.
//!
//! # Responsibilities
//! - Decide, per reported failure, whether the breaker should open
//! - Keep whatever history that decision needs (runs, rolling windows)
//!
//! # Design Decisions
//! - The breaker asks exactly once per reported failure
//! - Strategies are told about successes and resets so they can clear history
//! - Type allow/deny lists are decorators over another strategy

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::resilience::types::Failure;

/// Policy deciding whether an observed failure should open the breaker.
pub trait TripStrategy: Send + Sync {
    /// Called once per failure reported to the breaker.
    fn should_trip(&self, failure: &Failure) -> bool;

    /// Called when a guarded call succeeds.
    fn on_success(&self) {}

    /// Called when the breaker is reset to Closed.
    fn on_reset(&self) {}
}

impl<F> TripStrategy for F
where
    F: Fn(&Failure) -> bool + Send + Sync,
{
    fn should_trip(&self, failure: &Failure) -> bool {
        self(failure)
    }
}

/// Every failure trips the breaker.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysTrip;

impl TripStrategy for AlwaysTrip {
    fn should_trip(&self, _failure: &Failure) -> bool {
        true
    }
}

/// Trips on the N-th failure in a row; any success clears the run.
#[derive(Debug)]
pub struct ConsecutiveFailures {
    threshold: u32,
    run: AtomicU32,
}

impl ConsecutiveFailures {
    /// A threshold of 0 behaves like 1.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            run: AtomicU32::new(0),
        }
    }

    /// Current run of consecutive failures.
    pub fn current_run(&self) -> u32 {
        self.run.load(Ordering::Relaxed)
    }
}

impl TripStrategy for ConsecutiveFailures {
    fn should_trip(&self, _failure: &Failure) -> bool {
        let run = self.run.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        run >= self.threshold
    }

    fn on_success(&self) {
        self.run.store(0, Ordering::Relaxed);
    }

    fn on_reset(&self) {
        self.run.store(0, Ordering::Relaxed);
    }
}

/// Rolling error-rate over a time window.
///
/// Trips once the window holds at least `minimum_calls` outcomes and the share
/// of failures among them reaches `threshold` (0.0 to 1.0).
#[derive(Debug)]
pub struct FailureRate {
    window: Duration,
    minimum_calls: u32,
    threshold: f64,
    outcomes: Mutex<VecDeque<(Instant, bool)>>,
}

impl FailureRate {
    pub fn new(window: Duration, minimum_calls: u32, threshold: f64) -> Self {
        Self {
            window,
            minimum_calls: minimum_calls.max(1),
            threshold,
            outcomes: Mutex::new(VecDeque::new()),
        }
    }

    /// Failure ratio over the current window (0.0 when empty).
    pub fn current_rate(&self) -> f64 {
        let mut outcomes = self.outcomes.lock();
        Self::prune(&mut outcomes, Instant::now(), self.window);
        Self::rate(&outcomes).1
    }

    /// Records an outcome, returning (calls in window, failure ratio).
    fn record(&self, failed: bool) -> (usize, f64) {
        let now = Instant::now();
        let mut outcomes = self.outcomes.lock();
        Self::prune(&mut outcomes, now, self.window);
        outcomes.push_back((now, failed));
        Self::rate(&outcomes)
    }

    fn prune(outcomes: &mut VecDeque<(Instant, bool)>, now: Instant, window: Duration) {
        while let Some(&(at, _)) = outcomes.front() {
            if now.duration_since(at) > window {
                outcomes.pop_front();
            } else {
                break;
            }
        }
    }

    fn rate(outcomes: &VecDeque<(Instant, bool)>) -> (usize, f64) {
        let calls = outcomes.len();
        if calls == 0 {
            return (0, 0.0);
        }
        let failures = outcomes.iter().filter(|(_, failed)| *failed).count();
        (calls, failures as f64 / calls as f64)
    }
}

impl TripStrategy for FailureRate {
    fn should_trip(&self, _failure: &Failure) -> bool {
        let (calls, rate) = self.record(true);
        calls >= self.minimum_calls as usize && rate >= self.threshold
    }

    fn on_success(&self) {
        self.record(false);
    }

    fn on_reset(&self) {
        self.outcomes.lock().clear();
    }
}

/// Allow/deny list in front of another strategy.
///
/// Failures rejected by the predicate never trip and are not shown to the
/// inner strategy.
pub struct FailureFilter<S> {
    inner: S,
    predicate: Box<dyn Fn(&Failure) -> bool + Send + Sync>,
}

impl<S: TripStrategy> FailureFilter<S> {
    pub fn new<P>(inner: S, predicate: P) -> Self
    where
        P: Fn(&Failure) -> bool + Send + Sync + 'static,
    {
        Self {
            inner,
            predicate: Box::new(predicate),
        }
    }

    /// Only failures of concrete type `T` count.
    pub fn only<T>(inner: S) -> Self
    where
        T: std::error::Error + 'static,
    {
        Self::new(inner, |failure| failure.is::<T>())
    }

    /// Failures of concrete type `T` are ignored.
    pub fn except<T>(inner: S) -> Self
    where
        T: std::error::Error + 'static,
    {
        Self::new(inner, |failure| !failure.is::<T>())
    }

    /// The wrapped strategy.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: TripStrategy> TripStrategy for FailureFilter<S> {
    fn should_trip(&self, failure: &Failure) -> bool {
        (self.predicate)(failure) && self.inner.should_trip(failure)
    }

    fn on_success(&self) {
        self.inner.on_success();
    }

    fn on_reset(&self) {
        self.inner.on_reset();
    }
}

impl<S: fmt::Debug> fmt::Debug for FailureFilter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureFilter")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}
