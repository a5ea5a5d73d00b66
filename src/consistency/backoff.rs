use crate::config::BackoffConfig;
use std::time::Duration;

/// Exponential backoff between reconciliation attempts of one intent
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    base: Duration,
    multiplier: f64,
    max: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            base,
            multiplier: multiplier.max(1.0),
            max: max.max(base),
        }
    }

    /// Delay before the next attempt, given how many attempts already ran
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(63) as i32;
        let millis = self.base.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&BackoffConfig::default())
    }
}

impl From<&BackoffConfig> for BackoffPolicy {
    fn from(config: &BackoffConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            config.multiplier,
            Duration::from_millis(config.max_delay_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_delays_double_until_capped() {
        let policy = BackoffPolicy::new(Duration::from_millis(100), 2.0, Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(500), Duration::from_millis(1_000));
    }

    proptest! {
        #[test]
        fn delays_are_monotonic_and_bounded(
            base in 1u64..5_000,
            multiplier in 1.0f64..4.0,
            max in 5_000u64..120_000,
            attempts in 0u32..200,
        ) {
            let policy = BackoffPolicy::new(
                Duration::from_millis(base),
                multiplier,
                Duration::from_millis(max),
            );
            let current = policy.delay_for(attempts);
            prop_assert!(current <= Duration::from_millis(max));
            prop_assert!(policy.delay_for(attempts + 1) >= current);
        }
    }
}
