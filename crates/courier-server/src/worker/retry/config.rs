//! Retry policy configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default maximum number of attempts per logical delivery.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay before the second attempt, in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

/// Default upper bound for a single delay, in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 300_000;

/// Exponential backoff policy for failed deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct RetryConfig {
    /// Maximum number of attempts per logical delivery, the first included
    #[cfg_attr(
        feature = "config",
        arg(long = "retry-max-attempts", env = "RETRY_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)
    )]
    pub max_attempts: u32,

    /// Delay before the second attempt in milliseconds; doubles per attempt
    #[cfg_attr(
        feature = "config",
        arg(long = "retry-base-delay-ms", env = "RETRY_BASE_DELAY_MS", default_value_t = DEFAULT_BASE_DELAY_MS)
    )]
    pub base_delay_ms: u64,

    /// Upper bound for a single delay in milliseconds
    #[cfg_attr(
        feature = "config",
        arg(long = "retry-max-delay-ms", env = "RETRY_MAX_DELAY_MS", default_value_t = DEFAULT_MAX_DELAY_MS)
    )]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    /// Sets the maximum number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the base and maximum delays.
    #[must_use]
    pub fn with_delays(mut self, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Returns the delay to wait after `attempt` failed, before attempt `attempt + 1`.
    ///
    /// `base * 2^(attempt - 1)`, capped at the maximum delay.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);

        Duration::from_millis(delay_ms)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::config("retry max_attempts must be at least 1"));
        }

        if self.base_delay_ms == 0 {
            return Err(Error::config("retry base_delay_ms must be positive"));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::config(
                "retry max_delay_ms cannot be smaller than base_delay_ms",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let config = RetryConfig::default();

        assert_eq!(config.backoff(1), Duration::from_secs(1));
        assert_eq!(config.backoff(2), Duration::from_secs(2));
        assert_eq!(config.backoff(4), Duration::from_secs(8));
        assert_eq!(config.backoff(9), Duration::from_secs(256));
        assert_eq!(config.backoff(10), Duration::from_secs(300));
        assert_eq!(config.backoff(64), Duration::from_secs(300));
        assert_eq!(config.backoff(u32::MAX), Duration::from_secs(300));
    }

    #[test]
    fn test_validation() {
        assert!(RetryConfig::default().validate().is_ok());
        assert!(RetryConfig::default().with_max_attempts(0).validate().is_err());
        assert!(RetryConfig::default().with_delays(0, 10).validate().is_err());
        assert!(RetryConfig::default().with_delays(500, 100).validate().is_err());
        assert!(RetryConfig::default().with_delays(100, 100).validate().is_ok());
    }
}
