//! Exponential backoff with jitter, shared by reconnects, re-sends and retries.

use rand::Rng;
use std::time::Duration;

/// Delay schedule: `base_ms * 2^(attempt - 1)`, capped at `max_ms`, plus up to
/// 10% jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms }
    }

    /// Delay before attempt `attempt` (1-based). Attempt 0 waits nothing.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let capped = self
            .base_ms
            .saturating_mul(2u64.saturating_pow(attempt - 1))
            .min(self.max_ms);
        Duration::from_millis(capped.saturating_add(jitter(capped)))
    }

    pub async fn sleep(&self, attempt: u32) {
        tokio::time::sleep(self.delay(attempt)).await;
    }
}

fn jitter(delay_ms: u64) -> u64 {
    let range = delay_ms / 10;
    if range == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..range)
}
