//! Retry policy for asset relocation.
//!
//! Linear backoff: the delay after attempt `n` is `n * base_delay`.

use super::AssetError;
use crate::config::AssetSettings;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(settings: &AssetSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: settings.retry_base_delay,
        }
    }

    /// Whether to try again after `attempt` (1-based) failed with `error`.
    pub fn should_retry(&self, error: &AssetError, attempt: u32) -> bool {
        error.is_retryable() && attempt <= self.max_retries
    }

    /// Pause before the attempt following `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&AssetSettings::default())
    }
}
