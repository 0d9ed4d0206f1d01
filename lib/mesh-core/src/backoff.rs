//! Backoff policies for retry sequences

use serde::Deserialize;
use std::time::Duration;

/// Delay to wait before a given attempt; must be non-decreasing in `attempt`
pub trait Backoff: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

/// Exponential backoff capped at `max_backoff`
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ExponentialBackoff {
    /// Delay before the first retry
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    /// Upper bound for any delay
    #[serde(with = "millis")]
    pub max_backoff: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl ExponentialBackoff {
    pub fn new(initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            initial_backoff,
            max_backoff,
        }
    }
}

impl Backoff for ExponentialBackoff {
    /// `delay(0)` is zero; `delay(n)` is `initial * 2^(n-1)` up to the cap
    fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base = self.initial_backoff.as_millis() as u64;
        let exponential = 2u64.checked_pow(attempt - 1).unwrap_or(u64::MAX);
        let cap = self.max_backoff.as_millis() as u64;
        Duration::from_millis(base.saturating_mul(exponential).min(cap))
    }
}

/// Same delay for every attempt after the first
#[derive(Clone, Debug)]
pub struct ConstantBackoff(pub Duration);

impl Backoff for ConstantBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            self.0
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
