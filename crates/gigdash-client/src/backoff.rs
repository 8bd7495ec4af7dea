//! Reconnect delay policy.

use std::time::Duration;

use rand::Rng;

use gigdash_core::defaults;

/// Exponential backoff with additive jitter and a hard cap.
///
/// `delay(n) = min(base * 2^n + jitter, max)` where `jitter` is drawn
/// uniformly from `[0, jitter)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(defaults::RECONNECT_BASE_DELAY_MS),
            max: Duration::from_millis(defaults::RECONNECT_MAX_DELAY_MS),
            jitter: Duration::from_millis(defaults::RECONNECT_JITTER_MS),
        }
    }
}

impl BackoffPolicy {
    /// Delay for `attempt` with an explicit jitter value.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32, jitter: Duration) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
        let delay = Duration::from_millis(exp_ms.saturating_add(jitter.as_millis() as u64));
        delay.min(self.max)
    }

    /// Delay for `attempt` with fresh random jitter.
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..jitter_ms)
        };
        self.delay_for_attempt(attempt, Duration::from_millis(jitter))
    }
}
