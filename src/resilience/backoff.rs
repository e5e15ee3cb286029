//! Delay schedules between probe attempts.

use std::time::Duration;
use rand::Rng;

use crate::config::BackoffKind;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Delay schedule chosen from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    kind: BackoffKind,
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(kind: BackoffKind, base: Duration, max: Duration) -> Self {
        Self { kind, base, max }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self::new(BackoffKind::Fixed, delay, delay)
    }

    /// Delay to wait after the zero-based `attempt` failed to converge.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.kind {
            BackoffKind::Fixed => self.base,
            BackoffKind::Exponential => calculate_backoff(
                attempt.saturating_add(1),
                self.base.as_millis() as u64,
                self.max.as_millis() as u64,
            ),
        }
    }
}
