//! Exponential-with-cap backoff, shared by the DNS refresher and the
//! retry engine.

use std::time::Duration;

/// Validated backoff parameters.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    pub max_attempts: Option<u32>,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> crate::error::Result<Self> {
        if initial.is_zero() {
            return Err(crate::error::Error::invalid_config("initial backoff must be greater than zero"));
        }
        if multiplier < 1.0 {
            return Err(crate::error::Error::invalid_config(format!(
                "backoff multiplier must be >= 1.0, got {multiplier}"
            )));
        }
        if max < initial {
            return Err(crate::error::Error::invalid_config(format!(
                "max backoff ({max:?}) must be >= initial backoff ({initial:?})"
            )));
        }
        Ok(Self {
            initial,
            max,
            multiplier,
            max_attempts: None,
        })
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Backoff duration for `attempt` (0-indexed). `None` once `max_attempts`
    /// has been exceeded.
    pub fn duration_for(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return None;
            }
        }
        let scaled = self.multiplier.powi(attempt as i32);
        Some(self.initial.mul_f64(scaled).min(self.max))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(200),
            max: Duration::from_secs(10),
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

/// Stateful counter over a [`BackoffPolicy`], tracking the current attempt
/// number between `next_backoff`/`reset` calls.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    pub fn next_backoff(&mut self) -> Option<Duration> {
        let duration = self.policy.duration_for(self.attempt)?;
        self.attempt += 1;
        Some(duration)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_initial_backoff() {
        assert!(BackoffPolicy::new(Duration::ZERO, Duration::from_secs(1), 2.0).is_err());
    }

    #[test]
    fn doubles_until_capped() {
        let mut backoff = Backoff::new(BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(3), 2.0).unwrap());
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(1)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(2)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(3)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn reset_restarts_from_initial() {
        let mut backoff = Backoff::new(BackoffPolicy::new(Duration::from_millis(100), Duration::from_secs(5), 2.0).unwrap());
        backoff.next_backoff();
        backoff.next_backoff();
        backoff.reset();
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let mut backoff = Backoff::new(
            BackoffPolicy::new(Duration::from_millis(10), Duration::from_secs(1), 2.0)
                .unwrap()
                .with_max_attempts(Some(2)),
        );
        assert!(backoff.next_backoff().is_some());
        assert!(backoff.next_backoff().is_some());
        assert_eq!(backoff.next_backoff(), None);
    }
}
