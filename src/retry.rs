use std::time::Duration;

/// Exponential backoff with jitter-free doubling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given attempt (1-based). Attempt 1 runs immediately;
    /// attempt 2 waits `initial_delay`, attempt 3 twice that, capped at
    /// `max_delay`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.powi(attempt as i32 - 2);
        let delay = self.initial_delay.mul_f64(factor);
        delay.min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.initial_delay, Duration::from_secs(1));
        assert_eq!(p.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_delay_doubles() {
        let p = RetryPolicy::default();
        assert_eq!(p.delay_before(1), Duration::ZERO);
        assert_eq!(p.delay_before(2), Duration::from_secs(1));
        assert_eq!(p.delay_before(3), Duration::from_secs(2));
        assert_eq!(p.delay_before(4), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_capped() {
        let p = RetryPolicy {
            max_attempts: 10,
            ..RetryPolicy::default()
        };
        assert_eq!(p.delay_before(10), Duration::from_secs(30));
    }

    #[test]
    fn test_total_wait_boundaries() {
        // First attempt at t=0, second at >=1s, third at >=3s cumulative.
        let p = RetryPolicy::default();
        let cumulative: Duration = (1..=3).map(|a| p.delay_before(a)).sum();
        assert_eq!(cumulative, Duration::from_secs(3));
    }
}
