//! Retry policy for the SSH reachability loop.
//!
//! # Responsibilities
//! - Decide after each probe whether to stop (success/failure) or retry
//! - Enforce the grace period for fleets that are still booting
//! - Enforce an optional total attempt budget
//!
//! # Design Decisions
//! - Pure function of (attempt, tallies): no clock, no I/O
//! - Failure only after the grace period, and only when nothing answered
//! - A partially reachable fleet retries until the budget runs out

use std::time::Duration;

use crate::config::SshPollConfig;
use crate::resilience::backoff::Backoff;

/// What the poller should do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Every reporting host answered.
    Converged,
    /// Nothing answered after the grace period.
    Failed,
    /// Budget exhausted with the fleet still partially unreachable.
    Exhausted,
    /// Sleep, then probe again.
    RetryAfter(Duration),
}

/// Retry policy built from `[ssh_poll]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    grace_attempts: u32,
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(grace_attempts: u32, max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            grace_attempts,
            max_attempts,
            backoff,
        }
    }

    pub fn from_config(config: &SshPollConfig) -> Self {
        Self::new(
            config.grace_attempts,
            config.max_attempts,
            Backoff::new(config.backoff, config.interval(), config.max_delay()),
        )
    }

    /// Decide after the zero-based `attempt`.
    ///
    /// `completed` is false when the probe produced no report at all; such
    /// an attempt counts as zero reachable and can never converge.
    pub fn decide(&self, attempt: u32, completed: bool, reachable: usize, unreachable: usize) -> Decision {
        if attempt >= self.grace_attempts && reachable == 0 {
            return Decision::Failed;
        }
        if completed && unreachable == 0 {
            return Decision::Converged;
        }
        if self.max_attempts > 0 && attempt + 1 >= self.max_attempts {
            return Decision::Exhausted;
        }
        Decision::RetryAfter(self.backoff.delay(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SshPollConfig::default())
    }
}
