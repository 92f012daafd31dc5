//! Reconnect backoff policy.
//!
//! The policy itself is pure: [`Backoff::next`] maps the current delay to the
//! next one and [`Backoff::reset`] yields the floor. [`BackoffState`] carries
//! the current delay across sessions of one client run.

use std::time::Duration;

/// Default floor for the reconnect delay.
pub const MIN_DELAY_MS: u64 = 500;
/// Default ceiling for the reconnect delay.
pub const MAX_DELAY_MS: u64 = 30_000;
/// Default growth factor applied after each unhealthy session.
pub const FACTOR: f64 = 2.0;

/// Bounded exponential backoff policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    min_ms: u64,
    max_ms: u64,
    factor: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { min_ms: MIN_DELAY_MS, max_ms: MAX_DELAY_MS, factor: FACTOR }
    }
}

impl Backoff {
    /// Create a policy. Parameters are expected to be validated by the caller
    /// (see [`crate::ClientConfig::validate`]); `max` is raised to `min` if lower.
    pub fn new(min_ms: u64, max_ms: u64, factor: f64) -> Self {
        Self { min_ms, max_ms: max_ms.max(min_ms), factor }
    }

    pub fn min_ms(&self) -> u64 {
        self.min_ms
    }

    pub fn max_ms(&self) -> u64 {
        self.max_ms
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// `min(max, current * factor)`, truncated to whole milliseconds.
    pub fn next_ms(&self, current_ms: u64) -> u64 {
        let scaled = current_ms as f64 * self.factor;
        // float-to-int `as` saturates, so huge inputs land on the ceiling
        (scaled.min(self.max_ms as f64) as u64).min(self.max_ms)
    }

    pub fn next(&self, current: Duration) -> Duration {
        let current_ms = u64::try_from(current.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(self.next_ms(current_ms))
    }

    pub fn reset(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }
}

/// Current reconnect delay for one client run.
#[derive(Debug, Clone)]
pub struct BackoffState {
    policy: Backoff,
    current: Duration,
}

impl BackoffState {
    pub fn new(policy: Backoff) -> Self {
        Self { current: policy.reset(), policy }
    }

    /// Delay the next wait would use if the last session was unhealthy.
    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn policy(&self) -> &Backoff {
        &self.policy
    }

    /// Compute the wait before the next connect attempt.
    ///
    /// A healthy session resets the delay to the floor first. The returned
    /// wait is then grown for the attempt after it.
    pub fn schedule(&mut self, healthy: bool) -> Duration {
        if healthy {
            self.current = self.policy.reset();
        }
        let wait = self.current;
        self.current = self.policy.next(wait);
        wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn next_is_doubling_clamped_to_ceiling(current in 0u64..200_000u64) {
            let policy = Backoff::default();
            prop_assert_eq!(policy.next_ms(current), MAX_DELAY_MS.min(current * 2));
        }

        #[test]
        fn next_never_exceeds_ceiling(current in any::<u64>(), factor in 1.0f64..16.0) {
            let policy = Backoff::new(MIN_DELAY_MS, MAX_DELAY_MS, factor);
            prop_assert!(policy.next_ms(current) <= MAX_DELAY_MS);
        }

        #[test]
        fn unhealthy_schedule_is_monotonic(failures in 1usize..40) {
            let mut state = BackoffState::new(Backoff::default());
            let mut last = Duration::ZERO;
            for _ in 0..failures {
                let wait = state.schedule(false);
                prop_assert!(wait >= last);
                prop_assert!(wait <= Duration::from_millis(MAX_DELAY_MS));
                last = wait;
            }
        }
    }

    #[test]
    fn ceiling_is_idempotent() {
        let policy = Backoff::default();
        assert_eq!(policy.next_ms(MAX_DELAY_MS), MAX_DELAY_MS);
        assert_eq!(policy.next(Duration::from_millis(MAX_DELAY_MS)), Duration::from_millis(MAX_DELAY_MS));
    }

    #[test]
    fn reset_returns_floor() {
        assert_eq!(Backoff::default().reset(), Duration::from_millis(500));
        assert_eq!(Backoff::new(100, 50, 2.0).max_ms(), 100);
    }

    #[test]
    fn unhealthy_sessions_keep_growing() {
        let mut state = BackoffState::new(Backoff::default());
        let waits: Vec<u64> = (0..8).map(|_| state.schedule(false).as_millis() as u64).collect();
        assert_eq!(waits, vec![500, 1000, 2000, 4000, 8000, 16000, 30000, 30000]);
    }

    #[test]
    fn healthy_session_resets_to_floor() {
        let mut state = BackoffState::new(Backoff::default());
        for _ in 0..5 {
            state.schedule(false);
        }
        assert_eq!(state.current(), Duration::from_millis(16_000));

        assert_eq!(state.schedule(true), Duration::from_millis(500));
        assert_eq!(state.schedule(false), Duration::from_millis(1000));
    }

    #[test]
    fn fractional_factor_truncates() {
        let policy = Backoff::new(500, 30_000, 1.5);
        assert_eq!(policy.next_ms(500), 750);
        assert_eq!(policy.next_ms(751), 1126);
    }
}
