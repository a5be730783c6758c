//! Exponential backoff with jitter for retrying `Throttled`/`Transient`
//! store errors.

use rand::Rng;
use std::time::Duration;

/// Full-jitter exponential backoff: `sleep = random(0, min(cap, base * 2^attempt))`.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Duration to sleep before retry attempt number `attempt` (0-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self.base.as_millis().saturating_mul(1u128 << attempt.min(30));
        let capped = exp.min(self.cap.as_millis());
        let jittered = rand::rng().random_range(0..=capped.max(1));
        Duration::from_millis(jittered as u64)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(20), Duration::from_millis(2_000), 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_never_exceeds_cap() {
        let backoff = Backoff::new(Duration::from_millis(10), Duration::from_millis(100), 8);
        for attempt in 0..8 {
            assert!(backoff.delay(attempt) <= Duration::from_millis(100));
        }
    }
}
