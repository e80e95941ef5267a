//! Per-API circuit breaker: CLOSED → OPEN → CLOSED after a timeout.
//!
//! Deliberately two states only, no half-open probing tier: a recovering API should
//! not take a live trial call from real user traffic before the reset window has simply
//! elapsed. See `CircuitBreaker::is_open` for the lazy close-on-timeout behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::{Clock, MonotonicClock};

/// Tunables for [`CircuitBreaker`].
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: usize,
    /// How long the circuit stays open before a subsequent call is allowed through.
    pub reset_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_window: Duration::from_secs(300),
        }
    }
}

struct ApiState {
    consecutive_failures: AtomicUsize,
    /// Millis (per the injected clock) after which the circuit re-closes. 0 means not open.
    open_until_millis: AtomicU64,
}

impl ApiState {
    fn new() -> Self {
        Self {
            consecutive_failures: AtomicUsize::new(0),
            open_until_millis: AtomicU64::new(0),
        }
    }
}

/// Process-local, keyed-by-API-name circuit breaker.
///
/// One API's failures never influence another's state: each name gets its own
/// independent set of atomics. Mutating methods (`record_success`/`record_failure`)
/// are safe under concurrent fan-out from the parallel fetcher.
#[derive(Clone)]
pub struct CircuitBreaker {
    states: Arc<Mutex<HashMap<String, Arc<ApiState>>>>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_config(config, MonotonicClock::default())
    }

    /// Construct with an explicit clock, for deterministic tests.
    pub fn with_config<C: Clock + 'static>(config: CircuitBreakerConfig, clock: C) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            config,
            clock: Arc::new(clock),
        }
    }

    fn entry(&self, api_name: &str) -> Arc<ApiState> {
        let mut states = self.states.lock().expect("circuit breaker mutex poisoned");
        states
            .entry(api_name.to_string())
            .or_insert_with(|| Arc::new(ApiState::new()))
            .clone()
    }

    /// Whether `api_name`'s circuit is open (the API should be skipped).
    ///
    /// If the reset window has elapsed, this call itself closes the circuit as a
    /// side effect (matching the source behavior: the *next read* after timeout
    /// performs the CLOSED transition, not a background timer).
    pub fn is_open(&self, api_name: &str) -> bool {
        let state = self.entry(api_name);
        let open_until = state.open_until_millis.load(Ordering::Acquire);
        if open_until == 0 {
            return false;
        }

        let now = self.clock.now_millis();
        if now < open_until {
            return true;
        }

        state.consecutive_failures.store(0, Ordering::Release);
        state.open_until_millis.store(0, Ordering::Release);
        tracing::info!(api_name, "circuit breaker reset to closed after timeout");
        false
    }

    /// Record a successful call, resetting the failure count.
    pub fn record_success(&self, api_name: &str) {
        let state = self.entry(api_name);
        state.consecutive_failures.store(0, Ordering::Release);
        state.open_until_millis.store(0, Ordering::Release);
    }

    /// Record a failed call. Opens the circuit once `failure_threshold` consecutive
    /// failures have been observed.
    pub fn record_failure(&self, api_name: &str) {
        let state = self.entry(api_name);
        let failures = state.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;

        if failures >= self.config.failure_threshold {
            let open_until = self.clock.now_millis() + self.config.reset_window.as_millis() as u64;
            state.open_until_millis.store(open_until, Ordering::Release);
            tracing::warn!(api_name, failures, "circuit breaker opened");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64 as ManualMillis;

    #[derive(Debug, Clone)]
    struct ManualClock {
        now: Arc<ManualMillis>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self { now: Arc::new(ManualMillis::new(0)) }
        }

        fn advance(&self, millis: u64) {
            self.now.fetch_add(millis, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> u64 {
            self.now.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn starts_closed() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        assert!(!breaker.is_open("amazon_affiliate"));
    }

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::with_config(
            CircuitBreakerConfig { failure_threshold: 3, reset_window: Duration::from_secs(10) },
            ManualClock::new(),
        );
        for _ in 0..2 {
            breaker.record_failure("x");
        }
        assert!(!breaker.is_open("x"), "below threshold should stay closed");
        breaker.record_failure("x");
        assert!(breaker.is_open("x"), "at threshold should open");
    }

    #[test]
    fn closes_after_reset_window_elapses() {
        let clock = ManualClock::new();
        let breaker = CircuitBreaker::with_config(
            CircuitBreakerConfig { failure_threshold: 1, reset_window: Duration::from_millis(100) },
            clock.clone(),
        );
        breaker.record_failure("x");
        assert!(breaker.is_open("x"));

        clock.advance(150);
        assert!(!breaker.is_open("x"));
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig { failure_threshold: 3, ..Default::default() });
        breaker.record_failure("x");
        breaker.record_failure("x");
        breaker.record_success("x");
        breaker.record_failure("x");
        breaker.record_failure("x");
        assert!(!breaker.is_open("x"), "success should have reset the streak");
    }

    #[test]
    fn failures_are_isolated_per_api() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig { failure_threshold: 2, ..Default::default() });
        breaker.record_failure("x");
        breaker.record_failure("x");
        assert!(breaker.is_open("x"));
        assert!(!breaker.is_open("y"), "y's state must be unaffected by x's failures");
    }

    #[test]
    fn never_seen_api_reports_closed() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        assert!(!breaker.is_open("never_called"));
    }
}
