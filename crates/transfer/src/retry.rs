use std::time::Duration;

/// Bounded exponential backoff without jitter.
///
/// Pure configuration: the same attempt number always yields the same delay.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Ceiling applied to every delay.
    pub max_delay: Duration,
    /// Multiplier per attempt (values below 1.0 are treated as 1.0).
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt `attempt` (0-based):
    /// `min(base * factor^attempt, max_delay)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let factor = self.backoff_factor.max(1.0);
        let raw = self.base_delay.as_secs_f64() * factor.powi(exp);
        let max = self.max_delay.as_secs_f64();
        let capped = if raw.is_nan() { 0.0 } else { raw.min(max).max(0.0) };
        Duration::from_nanos((capped * 1e9).round() as u64)
    }

    /// Total attempts a persistently failing operation gets.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// The delays slept between attempts, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|i| self.delay_for_attempt(i))
    }
}
