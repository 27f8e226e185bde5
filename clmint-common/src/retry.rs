//! Attempt-bounded backoff.
//!
//! The `backoff` crate bounds retries by elapsed time only. [`BoundedBackoff`] caps the number
//! of attempts on top of any inner strategy, so a policy like "5 attempts, 5s apart" can be
//! expressed directly.

use std::time::Duration;

use backoff::backoff::{Backoff, Constant};

#[derive(Clone, Debug)]
pub struct BoundedBackoff<B> {
    inner: B,
    max_attempts: u32,
    attempts: u32,
}

impl<B: Backoff> BoundedBackoff<B> {
    /// `max_attempts` counts the first try, so at most `max_attempts - 1` delays are handed out.
    pub fn new(inner: B, max_attempts: u32) -> Self {
        Self { inner, max_attempts, attempts: 1 }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl BoundedBackoff<Constant> {
    pub fn constant(delay: Duration, max_attempts: u32) -> Self {
        Self::new(Constant::new(delay), max_attempts)
    }
}

impl<B: Backoff> Backoff for BoundedBackoff<B> {
    fn reset(&mut self) {
        self.attempts = 1;
        self.inner.reset();
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        self.inner.next_backoff()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_backoff_hands_out_one_delay_less_than_attempts() {
        let mut policy = BoundedBackoff::constant(Duration::from_secs(5), 5);

        let delays: Vec<_> = std::iter::from_fn(|| policy.next_backoff()).collect();

        assert_eq!(delays, vec![Duration::from_secs(5); 4]);
    }

    #[test]
    fn test_reset_restores_budget() {
        let mut policy = BoundedBackoff::constant(Duration::from_millis(1), 2);
        assert!(policy.next_backoff().is_some());
        assert!(policy.next_backoff().is_none());

        policy.reset();

        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(1)));
    }

    #[test]
    fn test_single_attempt_never_retries() {
        let mut policy = BoundedBackoff::constant(Duration::from_millis(1), 1);

        assert_eq!(policy.next_backoff(), None);
    }
}
