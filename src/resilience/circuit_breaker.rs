//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: cooldown over, probe calls decide recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: strategy trips on a reported failure
//! Open → Open: trip() again before the deadline, cooldown unchanged
//! Open → Half-Open: caller admitted after the cooldown deadline (no timer)
//! Half-Open → Open: any reported failure, including on an expired Open
//! Half-Open → Closed: success count exceeds the threshold
//! any → Closed: reset()
//! ```
//!
//! # Design Decisions
//! - The whole breaker state is one immutable snapshot behind an `ArcSwap`
//! - Every mutation is load → compute next → compare-and-swap → retry on conflict
//! - Reads are a single atomic load and may be slightly stale
//! - Half-Open admits at most `half_open_max_probes` calls at once
//! - The state machine never logs; see `guard.rs` for the logging call wrapper

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;

use crate::resilience::options::BreakerOptions;
use crate::resilience::strategy::TripStrategy;
use crate::resilience::types::{CircuitBroken, CircuitState, Failure};

/// Point-in-time copy of a breaker's state.
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    /// Committed state. An expired Open stays Open here until a caller acts.
    pub state: CircuitState,
    /// Most recently reported failure.
    pub last_failure: Option<Failure>,
    /// When the state last changed.
    pub state_changed_at: Instant,
    /// When an Open breaker becomes eligible for a probe. Set only while Open.
    pub cooldown_deadline: Option<Instant>,
    /// Successes observed while Half-Open.
    pub half_open_success_count: u32,
    /// Probe calls admitted while Half-Open that have not reported back.
    pub half_open_in_flight: u32,
}

impl BreakerSnapshot {
    fn closed(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            last_failure: None,
            state_changed_at: now,
            cooldown_deadline: None,
            half_open_success_count: 0,
            half_open_in_flight: 0,
        }
    }

    fn initial(options: &BreakerOptions, now: Instant) -> Self {
        let mut snapshot = Self::closed(now);
        snapshot.state = options.initial_state;
        if options.initial_state == CircuitState::Open {
            snapshot.cooldown_deadline = Some(deadline_after(now, options.default_cooldown));
        }
        snapshot
    }

    /// State as a caller should see it at `now`: an Open breaker whose
    /// cooldown has passed reads as Half-Open.
    pub fn effective_state(&self, now: Instant) -> CircuitState {
        match (self.state, self.cooldown_deadline) {
            (CircuitState::Open, Some(deadline)) if now < deadline => CircuitState::Open,
            (CircuitState::Open, _) => CircuitState::HalfOpen,
            (state, _) => state,
        }
    }

    /// Time left until the cooldown deadline, if Open and not yet expired.
    pub fn remaining_cooldown(&self, now: Instant) -> Option<Duration> {
        match (self.state, self.cooldown_deadline) {
            (CircuitState::Open, Some(deadline)) if now < deadline => Some(deadline - now),
            _ => None,
        }
    }
}

/// Longest cooldown a deadline is allowed to represent.
const MAX_COOLDOWN: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `now + cooldown`, saturating instead of overflowing `Instant`.
fn deadline_after(now: Instant, cooldown: Duration) -> Instant {
    now.checked_add(cooldown.min(MAX_COOLDOWN))
        .or_else(|| now.checked_add(Duration::from_secs(24 * 60 * 60)))
        .unwrap_or(now)
}

/// Outcome of one pass of the transition loop.
enum Step<R> {
    /// Nothing to write.
    Keep(R),
    /// Install the new snapshot if nobody else got there first.
    Commit(BreakerSnapshot, R),
}

/// Circuit breaker shared by every caller protecting one dependency.
pub struct CircuitBreaker {
    snapshot: ArcSwap<BreakerSnapshot>,
    options: Arc<BreakerOptions>,
    strategy: Box<dyn TripStrategy>,
}

impl CircuitBreaker {
    /// Create a breaker with the given trip strategy and options.
    pub fn new<S>(strategy: S, options: impl Into<Arc<BreakerOptions>>) -> Self
    where
        S: TripStrategy + 'static,
    {
        Self::from_boxed(Box::new(strategy), options)
    }

    /// Create a breaker with default options.
    pub fn with_defaults<S>(strategy: S) -> Self
    where
        S: TripStrategy + 'static,
    {
        Self::new(strategy, BreakerOptions::default())
    }

    /// Create a breaker from an already boxed strategy.
    pub fn from_boxed(
        strategy: Box<dyn TripStrategy>,
        options: impl Into<Arc<BreakerOptions>>,
    ) -> Self {
        let options = options.into();
        let snapshot = BreakerSnapshot::initial(&options, Instant::now());
        Self {
            snapshot: ArcSwap::from_pointee(snapshot),
            options,
            strategy,
        }
    }

    // --- Transitions ---

    /// Report a failed guarded call.
    ///
    /// Records the failure and asks the strategy whether to trip. A failure
    /// while Half-Open always trips: the probe showed the dependency is still
    /// down.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitBroken`] when this failure tripped the breaker (or the
    /// breaker was already open and the strategy asked to trip).
    pub fn report_failure(&self, failure: impl Into<Failure>) -> Result<(), CircuitBroken> {
        let failure = failure.into();
        let probing = self.state() == CircuitState::HalfOpen;

        if self.strategy.should_trip(&failure) || probing {
            return Err(self.trip(failure, None));
        }

        self.transition(|current, _now| {
            let mut next = current.clone();
            next.last_failure = Some(failure.clone());
            Step::Commit(next, ())
        });
        Ok(())
    }

    /// Force the breaker open and return the broken-circuit signal.
    ///
    /// A newly opened breaker gets `cooldown` (or the default cooldown) and the
    /// signal carries the time left until it ends. An open breaker still in its
    /// cooldown keeps its deadline and the signal carries no retry-after hint;
    /// one whose cooldown has passed is opened again with a fresh deadline.
    /// Cooldowns too large for an `Instant` are capped.
    #[must_use = "the broken-circuit signal must stop the current attempt"]
    pub fn trip(&self, failure: impl Into<Failure>, cooldown: Option<Duration>) -> CircuitBroken {
        let failure = failure.into();
        let cooldown = cooldown.unwrap_or(self.options.default_cooldown);

        self.transition(|current, now| {
            let mut next = current.clone();
            next.last_failure = Some(failure.clone());

            // Still cooling down: only the last failure moves.
            if current.effective_state(now) == CircuitState::Open {
                return Step::Commit(next, CircuitBroken::new(Some(failure.clone()), None));
            }

            let deadline = deadline_after(now, cooldown);
            next.state = CircuitState::Open;
            next.state_changed_at = now;
            next.cooldown_deadline = Some(deadline);
            next.half_open_success_count = 0;
            next.half_open_in_flight = 0;

            let retry_after = deadline.saturating_duration_since(now);
            Step::Commit(next, CircuitBroken::new(Some(failure.clone()), Some(retry_after)))
        })
    }

    /// Admission check made before a guarded call.
    ///
    /// Closed admits. Open rejects until the cooldown deadline; the first
    /// caller to arrive after it moves the breaker to Half-Open and is
    /// admitted as a probe. Half-Open admits while fewer than
    /// `half_open_max_probes` probes are outstanding.
    ///
    /// A caller admitted in Half-Open holds a probe slot until it reports the
    /// outcome or calls [`release_probe`](CircuitBreaker::release_probe).
    ///
    /// # Errors
    ///
    /// Returns [`CircuitBroken`] carrying the last failure: with the time left
    /// in the cooldown while the breaker is open, without a hint when every
    /// probe slot is taken.
    pub fn try_acquire(&self) -> Result<CircuitState, CircuitBroken> {
        if self.stored_state() == CircuitState::Closed {
            return Ok(CircuitState::Closed);
        }

        let max_probes = self.options.half_open_max_probes.max(1);
        self.transition(|current, now| match current.state {
            CircuitState::Closed => Step::Keep(Ok(CircuitState::Closed)),
            CircuitState::Open => {
                if let Some(remaining) = current.remaining_cooldown(now) {
                    let broken = CircuitBroken::new(current.last_failure.clone(), Some(remaining));
                    return Step::Keep(Err(broken));
                }

                let mut next = current.clone();
                next.state = CircuitState::HalfOpen;
                next.state_changed_at = now;
                next.cooldown_deadline = None;
                next.half_open_success_count = 0;
                next.half_open_in_flight = 1;
                Step::Commit(next, Ok(CircuitState::HalfOpen))
            }
            CircuitState::HalfOpen => {
                if current.half_open_in_flight >= max_probes {
                    let broken = CircuitBroken::new(current.last_failure.clone(), None);
                    return Step::Keep(Err(broken));
                }

                let mut next = current.clone();
                next.half_open_in_flight += 1;
                Step::Commit(next, Ok(CircuitState::HalfOpen))
            }
        })
    }

    /// Give back a Half-Open probe slot without reporting an outcome.
    ///
    /// For callers that were admitted but abandoned the call. Outside
    /// Half-Open this is a no-op.
    pub fn release_probe(&self) {
        self.transition(|current, _now| {
            if current.state != CircuitState::HalfOpen || current.half_open_in_flight == 0 {
                return Step::Keep(());
            }
            let mut next = current.clone();
            next.half_open_in_flight -= 1;
            Step::Commit(next, ())
        });
    }

    /// Report a successful probe while Half-Open.
    ///
    /// Closes the breaker once the success count exceeds the configured
    /// threshold. Outside Half-Open this is a no-op. Returns the state after
    /// the call.
    pub fn report_half_open_success(&self) -> CircuitState {
        let threshold = self.options.half_open_success_threshold;

        let (state, closed_now) = self.transition(|current, now| {
            if current.state != CircuitState::HalfOpen {
                return Step::Keep((current.state, false));
            }

            let count = current.half_open_success_count.saturating_add(1);
            if count > threshold {
                return Step::Commit(BreakerSnapshot::closed(now), (CircuitState::Closed, true));
            }

            let mut next = current.clone();
            next.half_open_success_count = count;
            next.half_open_in_flight = next.half_open_in_flight.saturating_sub(1);
            Step::Commit(next, (CircuitState::HalfOpen, false))
        });

        if closed_now {
            self.strategy.on_reset();
        }
        state
    }

    /// Report a successful guarded call in any state.
    pub fn report_success(&self) -> CircuitState {
        self.strategy.on_success();
        self.report_half_open_success()
    }

    /// Force the breaker Closed, clearing the success count and last failure.
    pub fn reset(&self) {
        self.transition(|_current, now| Step::Commit(BreakerSnapshot::closed(now), ()));
        self.strategy.on_reset();
    }

    /// Blindly overwrite the state with Closed, skipping the transition loop
    /// and the strategy hook. Test builds only: it can race with `trip`.
    #[cfg(any(test, feature = "test-util"))]
    pub fn force_test_reset(&self) {
        self.snapshot
            .store(Arc::new(BreakerSnapshot::closed(Instant::now())));
    }

    fn transition<R>(&self, mut step: impl FnMut(&BreakerSnapshot, Instant) -> Step<R>) -> R {
        loop {
            let current = self.snapshot.load_full();
            match step(&current, Instant::now()) {
                Step::Keep(result) => return result,
                Step::Commit(next, result) => {
                    let previous = self.snapshot.compare_and_swap(&current, Arc::new(next));
                    if Arc::ptr_eq(&*previous, &current) {
                        return result;
                    }
                }
            }
        }
    }

    // --- Observers ---

    /// Effective state: an expired Open reads as Half-Open.
    pub fn state(&self) -> CircuitState {
        self.snapshot.load().effective_state(Instant::now())
    }

    /// Committed state, without cooldown expiry applied.
    pub fn stored_state(&self) -> CircuitState {
        self.snapshot.load().state
    }

    /// Most recently reported failure.
    pub fn last_failure(&self) -> Option<Failure> {
        self.snapshot.load().last_failure.clone()
    }

    /// When the state last changed.
    pub fn state_changed_at(&self) -> Instant {
        self.snapshot.load().state_changed_at
    }

    /// Cooldown deadline while Open.
    pub fn cooldown_deadline(&self) -> Option<Instant> {
        self.snapshot.load().cooldown_deadline
    }

    /// Successes counted while Half-Open.
    pub fn half_open_success_count(&self) -> u32 {
        self.snapshot.load().half_open_success_count
    }

    /// Probe calls admitted while Half-Open and not yet reported.
    pub fn half_open_in_flight(&self) -> u32 {
        self.snapshot.load().half_open_in_flight
    }

    /// Copy of the whole current state.
    pub fn snapshot(&self) -> BreakerSnapshot {
        BreakerSnapshot::clone(&self.snapshot.load())
    }

    /// Options the breaker was built with.
    pub fn options(&self) -> &BreakerOptions {
        &self.options
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("snapshot", &*self.snapshot.load_full())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::strategy::{AlwaysTrip, ConsecutiveFailures};
    use std::io;
    use std::sync::Barrier;
    use std::thread;

    fn failure(msg: &str) -> Failure {
        Failure::new(io::Error::new(io::ErrorKind::Other, msg.to_string()))
    }

    fn breaker(cooldown_ms: u64, threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            AlwaysTrip,
            BreakerOptions::default()
                .with_cooldown(Duration::from_millis(cooldown_ms))
                .with_half_open_success_threshold(threshold),
        )
    }

    /// Trip, wait out the cooldown and get admitted as a probe.
    fn into_half_open(cb: &CircuitBreaker) {
        let _ = cb.trip(failure("down"), Some(Duration::from_millis(10)));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(cb.try_acquire().unwrap(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_initial_state() {
        let cb = CircuitBreaker::with_defaults(AlwaysTrip);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.last_failure().is_none());
        assert!(cb.cooldown_deadline().is_none());
        assert_eq!(cb.half_open_success_count(), 0);
        assert_eq!(cb.options(), &BreakerOptions::default());
    }

    #[test]
    fn test_initial_open_has_deadline() {
        let options = BreakerOptions::default().with_initial_state(CircuitState::Open);
        let cb = CircuitBreaker::new(AlwaysTrip, options);
        assert_eq!(cb.state(), CircuitState::Open);
        let snapshot = cb.snapshot();
        assert!(snapshot.cooldown_deadline.unwrap() >= snapshot.state_changed_at);
        assert!(cb.try_acquire().is_err());
    }

    #[test]
    fn test_trip_opens_with_retry_after() {
        let cb = breaker(100, 1);
        let broken = cb.trip(failure("boom"), None);

        assert_eq!(cb.state(), CircuitState::Open);
        let retry_after = broken.retry_after().unwrap();
        assert!(retry_after > Duration::ZERO);
        assert!(retry_after <= Duration::from_millis(100));
        assert_eq!(broken.failure().unwrap().to_string(), "boom");

        let snapshot = cb.snapshot();
        assert!(snapshot.cooldown_deadline.unwrap() >= snapshot.state_changed_at);
    }

    #[test]
    fn test_explicit_cooldown_overrides_default() {
        let cb = breaker(100, 1);
        let broken = cb.trip(failure("boom"), Some(Duration::from_secs(5)));
        assert!(broken.retry_after().unwrap() > Duration::from_millis(100));
    }

    #[test]
    fn test_retrip_keeps_deadline() {
        let cb = breaker(100, 1);
        let _ = cb.trip(failure("first"), None);
        let deadline = cb.cooldown_deadline();
        let changed_at = cb.state_changed_at();

        thread::sleep(Duration::from_millis(10));
        let broken = cb.trip(failure("second"), Some(Duration::from_secs(60)));

        assert!(broken.retry_after().is_none());
        assert_eq!(broken.failure().unwrap().to_string(), "second");
        assert_eq!(cb.cooldown_deadline(), deadline);
        assert_eq!(cb.state_changed_at(), changed_at);
        assert_eq!(cb.last_failure().unwrap().to_string(), "second");
    }

    #[test]
    fn test_cooldown_scenario() {
        let cb = breaker(100, 1);
        let first = failure("E");

        let broken = cb.trip(first.clone(), None);
        assert!(broken.retry_after().is_some());
        let deadline = cb.cooldown_deadline();

        thread::sleep(Duration::from_millis(10));
        let broken = cb.trip(first.clone(), None);
        assert!(broken.failure().unwrap().ptr_eq(&first));
        assert!(broken.retry_after().is_none());
        assert_eq!(cb.cooldown_deadline(), deadline);

        thread::sleep(Duration::from_millis(140));
        assert_eq!(cb.stored_state(), CircuitState::Open);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.try_acquire().unwrap(), CircuitState::HalfOpen);
        assert_eq!(cb.stored_state(), CircuitState::HalfOpen);
        assert!(cb.cooldown_deadline().is_none());
    }

    #[test]
    fn test_try_acquire_rejects_during_cooldown() {
        let cb = breaker(1_000, 1);
        let _ = cb.trip(failure("down"), None);

        let broken = cb.try_acquire().unwrap_err();
        assert_eq!(broken.failure().unwrap().to_string(), "down");
        let retry_after = broken.retry_after().unwrap();
        assert!(retry_after <= Duration::from_secs(1));
        assert_eq!(cb.stored_state(), CircuitState::Open);
    }

    #[test]
    fn test_report_failure_consults_strategy() {
        let cb = CircuitBreaker::new(ConsecutiveFailures::new(3), BreakerOptions::default());

        assert!(cb.report_failure(failure("1")).is_ok());
        assert!(cb.report_failure(failure("2")).is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.last_failure().unwrap().to_string(), "2");

        let broken = cb.report_failure(failure("3")).unwrap_err();
        assert!(broken.retry_after().is_some());
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_success_clears_strategy_run() {
        let cb = CircuitBreaker::new(ConsecutiveFailures::new(2), BreakerOptions::default());

        assert!(cb.report_failure(failure("1")).is_ok());
        assert_eq!(cb.report_success(), CircuitState::Closed);
        assert!(cb.report_failure(failure("2")).is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = CircuitBreaker::new(ConsecutiveFailures::new(10), BreakerOptions::default());
        into_half_open(&cb);

        let broken = cb.report_failure(failure("probe failed")).unwrap_err();
        assert!(broken.retry_after().is_some());
        assert_eq!(cb.stored_state(), CircuitState::Open);
        assert_eq!(cb.half_open_success_count(), 0);
    }

    #[test]
    fn test_failure_after_cooldown_reopens_without_acquire() {
        let cb = CircuitBreaker::new(
            ConsecutiveFailures::new(10),
            BreakerOptions::default().with_cooldown(Duration::from_millis(50)),
        );
        let _ = cb.trip(failure("down"), None);
        let first_deadline = cb.cooldown_deadline().unwrap();

        thread::sleep(Duration::from_millis(70));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.stored_state(), CircuitState::Open);

        let broken = cb.report_failure(failure("still down")).unwrap_err();
        assert!(broken.retry_after().is_some());
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.cooldown_deadline().unwrap() > first_deadline);
        assert!(cb.try_acquire().is_err());
    }

    #[test]
    fn test_trip_after_cooldown_rearms_deadline() {
        let cb = breaker(20, 1);
        let _ = cb.trip(failure("first"), None);
        let changed_at = cb.state_changed_at();

        thread::sleep(Duration::from_millis(40));
        let broken = cb.trip(failure("second"), None);

        assert!(broken.retry_after().unwrap() <= Duration::from_millis(20));
        assert!(cb.state_changed_at() > changed_at);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_huge_cooldown_saturates() {
        let cb = breaker(100, 1);
        let broken = cb.trip(failure("down"), Some(Duration::MAX));

        assert_eq!(cb.state(), CircuitState::Open);
        assert!(broken.retry_after().unwrap() > Duration::from_secs(365 * 24 * 60 * 60));
        assert!(cb.try_acquire().is_err());
    }

    #[test]
    fn test_huge_initial_cooldown_saturates() {
        let options = BreakerOptions::default()
            .with_initial_state(CircuitState::Open)
            .with_cooldown(Duration::MAX);
        let cb = CircuitBreaker::new(AlwaysTrip, options);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.try_acquire().is_err());
    }

    #[test]
    fn test_half_open_admits_single_probe() {
        let cb = breaker(10, 1);
        into_half_open(&cb);
        assert_eq!(cb.half_open_in_flight(), 1);

        for _ in 0..10 {
            let broken = cb.try_acquire().unwrap_err();
            assert!(broken.retry_after().is_none());
            assert_eq!(broken.failure().unwrap().to_string(), "down");
        }

        // Reporting frees the slot for the next probe.
        assert_eq!(cb.report_success(), CircuitState::HalfOpen);
        assert_eq!(cb.half_open_in_flight(), 0);
        assert_eq!(cb.try_acquire().unwrap(), CircuitState::HalfOpen);
        assert!(cb.try_acquire().is_err());
        assert_eq!(cb.report_success(), CircuitState::Closed);
        assert_eq!(cb.try_acquire().unwrap(), CircuitState::Closed);
    }

    #[test]
    fn test_release_probe_frees_slot() {
        let cb = breaker(10, 1);
        into_half_open(&cb);
        assert!(cb.try_acquire().is_err());

        cb.release_probe();
        assert_eq!(cb.half_open_in_flight(), 0);
        assert_eq!(cb.half_open_success_count(), 0);
        assert_eq!(cb.try_acquire().unwrap(), CircuitState::HalfOpen);

        // No-op outside Half-Open.
        cb.reset();
        cb.release_probe();
        assert_eq!(cb.half_open_in_flight(), 0);
    }

    #[test]
    fn test_half_open_closes_after_exceeding_threshold() {
        let cb = breaker(10, 2);
        into_half_open(&cb);

        assert_eq!(cb.report_half_open_success(), CircuitState::HalfOpen);
        assert_eq!(cb.half_open_success_count(), 1);
        assert_eq!(cb.report_half_open_success(), CircuitState::HalfOpen);
        assert_eq!(cb.half_open_success_count(), 2);

        assert_eq!(cb.report_half_open_success(), CircuitState::Closed);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.half_open_success_count(), 0);
        assert!(cb.last_failure().is_none());
    }

    #[test]
    fn test_default_threshold_needs_two_successes() {
        let cb = breaker(10, 1);
        into_half_open(&cb);

        assert_eq!(cb.report_success(), CircuitState::HalfOpen);
        assert_eq!(cb.report_success(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_success_outside_half_open_is_noop() {
        let cb = breaker(1_000, 1);
        assert_eq!(cb.report_half_open_success(), CircuitState::Closed);

        let _ = cb.trip(failure("down"), None);
        assert_eq!(cb.report_half_open_success(), CircuitState::Open);
        assert_eq!(cb.half_open_success_count(), 0);
    }

    #[test]
    fn test_reset_from_every_state() {
        let cb = breaker(10, 5);

        let _ = cb.trip(failure("down"), None);
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.last_failure().is_none());

        into_half_open(&cb);
        cb.report_half_open_success();
        cb.reset();
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.half_open_success_count, 0);
        assert!(snapshot.last_failure.is_none());
        assert!(snapshot.cooldown_deadline.is_none());

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_force_test_reset() {
        let cb = breaker(1_000, 1);
        let _ = cb.trip(failure("down"), None);
        cb.force_test_reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.last_failure().is_none());
    }

    #[test]
    fn test_concurrent_trips_open_once() {
        let cb = Arc::new(breaker(60_000, 1));
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let cb = Arc::clone(&cb);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cb.trip(failure(&format!("t{}", i)), None)
                })
            })
            .collect();

        let signals: Vec<CircuitBroken> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let fresh = signals.iter().filter(|b| b.retry_after().is_some()).count();

        assert_eq!(fresh, 1);
        assert_eq!(signals.len(), 16);
        assert_eq!(cb.stored_state(), CircuitState::Open);

        let deadline = cb.cooldown_deadline();
        let _ = cb.trip(failure("late"), None);
        assert_eq!(cb.cooldown_deadline(), deadline);
    }

    #[test]
    fn test_concurrent_probe_admission_is_limited() {
        let cb = Arc::new(CircuitBreaker::new(
            AlwaysTrip,
            BreakerOptions::default()
                .with_cooldown(Duration::from_millis(10))
                .with_half_open_max_probes(3),
        ));
        let _ = cb.trip(failure("down"), None);
        thread::sleep(Duration::from_millis(20));

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cb = Arc::clone(&cb);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let admitted = cb.try_acquire();
                    (admitted, cb.state_changed_at())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let admitted = results.iter().filter(|(admitted, _)| admitted.is_ok()).count();
        assert_eq!(admitted, 3);
        assert_eq!(cb.half_open_in_flight(), 3);

        // Everyone observes the same Half-Open transition.
        let changed_at = cb.state_changed_at();
        assert!(results.iter().all(|(_, at)| *at == changed_at));
        assert_eq!(cb.stored_state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_concurrent_half_open_successes_are_all_counted() {
        let cb = Arc::new(breaker(10, 1_000));
        into_half_open(&cb);

        thread::scope(|scope| {
            for _ in 0..8 {
                let cb = &cb;
                scope.spawn(move || {
                    for _ in 0..50 {
                        cb.report_half_open_success();
                    }
                });
            }
        });

        assert_eq!(cb.half_open_success_count(), 400);
        assert_eq!(cb.stored_state(), CircuitState::HalfOpen);
    }
}
