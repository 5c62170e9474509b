//! Bounded exponential backoff for broker reconnects

use std::time::Duration;

/// Exponential delay capped at a maximum.
///
/// Attempt `n` (1-based) waits `min(base * 2^(n-1), max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    pub fn from_millis(base_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_ms), Duration::from_millis(max_ms))
    }

    /// Delay before reconnect attempt `attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.base.saturating_mul(1u32 << exponent).min(self.max)
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_millis(1_000, 30_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_until_cap() {
        let backoff = Backoff::from_millis(100, 1_000);

        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
        assert_eq!(backoff.delay(5), Duration::from_millis(1_000));
        assert_eq!(backoff.delay(60), Duration::from_millis(1_000));
    }

    #[test]
    fn test_attempt_zero_uses_base() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
    }

    #[test]
    fn test_max_never_below_base() {
        let backoff = Backoff::from_millis(500, 10);
        assert_eq!(backoff.max(), Duration::from_millis(500));
        assert_eq!(backoff.delay(3), Duration::from_millis(500));
    }
}
