//! Retry policy for remote requests.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the delay between attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay doubles after each failure, capped at `max_delay_ms`.
    Exponential { max_delay_ms: u64 },
}

/// Bounded retry policy passed explicitly to fetchers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub delay_ms: u64,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 2_000,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: delay.as_millis() as u64,
            backoff: Backoff::Fixed,
        }
    }

    pub fn exponential(max_attempts: u32, initial: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: initial.as_millis() as u64,
            backoff: Backoff::Exponential {
                max_delay_ms: max_delay.as_millis() as u64,
            },
        }
    }

    /// Delay to wait after `failed_attempt` (1-based) before trying again.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let base = Duration::from_millis(self.delay_ms);
        match self.backoff {
            Backoff::Fixed => base,
            Backoff::Exponential { max_delay_ms } => {
                let factor = 2u32.saturating_pow(failed_attempt.saturating_sub(1));
                std::cmp::min(
                    base.saturating_mul(factor),
                    Duration::from_millis(max_delay_ms),
                )
            }
        }
    }

    /// True if another attempt is allowed after `attempts` have been made.
    pub fn can_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("retry.max_attempts must be > 0".to_string());
        }
        if let Backoff::Exponential { max_delay_ms } = self.backoff {
            if max_delay_ms < self.delay_ms {
                return Err("retry.backoff.max_delay_ms must be >= retry.delay_ms".to_string());
            }
        }
        Ok(())
    }
}
