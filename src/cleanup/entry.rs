//! Per-path failure bookkeeping: exponential backoff and circuit
//! breaker state, independent of the pending-cleanup queue itself.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct FailureState {
    pub consecutive_failures: u32,
    next_retry_at: Option<Instant>,
}

impl FailureState {
    pub fn record_failure(&mut self, base_backoff: Duration, max_backoff: Duration) {
        self.consecutive_failures += 1;
        let exponent = self.consecutive_failures.saturating_sub(1).min(31);
        let scaled = base_backoff.as_secs_f64() * 2f64.powi(exponent as i32);
        let delay = Duration::from_secs_f64(scaled.min(max_backoff.as_secs_f64()));
        self.next_retry_at = Some(Instant::now() + delay);
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.next_retry_at = None;
    }

    pub fn is_ready_for_retry(&self) -> bool {
        match self.next_retry_at {
            Some(at) => Instant::now() >= at,
            None => true,
        }
    }

    pub fn has_tripped_circuit_breaker(&self, max_failures: u32) -> bool {
        self.consecutive_failures >= max_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_ready_immediately() {
        let state = FailureState::default();
        assert!(state.is_ready_for_retry());
        assert!(!state.has_tripped_circuit_breaker(5));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut state = FailureState::default();
        let base = Duration::from_millis(10);
        let max = Duration::from_millis(35);

        state.record_failure(base, max);
        assert!(!state.is_ready_for_retry());

        // Force past the (short) backoff window to check subsequent growth
        // doesn't panic and keeps capping at max.
        for _ in 0..5 {
            state.record_failure(base, max);
        }
        assert_eq!(state.consecutive_failures, 6);
    }

    #[test]
    fn reset_clears_failure_count() {
        let mut state = FailureState::default();
        state.record_failure(Duration::from_millis(1), Duration::from_millis(10));
        state.reset();
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.is_ready_for_retry());
    }

    #[test]
    fn circuit_breaker_trips_at_threshold() {
        let mut state = FailureState::default();
        for _ in 0..5 {
            state.record_failure(Duration::from_millis(1), Duration::from_millis(10));
        }
        assert!(state.has_tripped_circuit_breaker(5));
    }
}
