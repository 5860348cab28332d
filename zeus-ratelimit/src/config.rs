//! Rate limit configuration

use crate::error::{RateLimitError, RateLimitResult};
use crate::limiter::RateLimiter;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Rate limit settings for one verticle.
///
/// `permits_per_second` is tri-state: `None` disables limiting, `Some(0.0)`
/// refuses every request, and a positive rate enables the token bucket.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub permits_per_second: Option<f64>,
    /// Only meaningful when a rate is set
    pub acquire_timeout: Option<Duration>,
}

impl RateLimitConfig {
    /// Rate limiting turned off
    pub const fn disabled() -> Self {
        Self {
            permits_per_second: None,
            acquire_timeout: None,
        }
    }

    /// Limit to `permits_per_second`
    pub fn per_second(permits_per_second: f64) -> Self {
        Self {
            permits_per_second: Some(permits_per_second),
            acquire_timeout: None,
        }
    }

    /// Allow acquires to wait up to `timeout`
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Build from resolved descriptor values; the timeout is in nanoseconds
    pub fn from_parts(
        permits_per_second: Option<f64>,
        acquire_timeout_nanos: Option<i64>,
    ) -> RateLimitResult<Self> {
        let acquire_timeout = acquire_timeout_nanos
            .map(|nanos| {
                u64::try_from(nanos).map(Duration::from_nanos).map_err(|_| {
                    RateLimitError::config(format!(
                        "acquire timeout must not be negative, got {}ns",
                        nanos
                    ))
                })
            })
            .transpose()?;

        let config = Self {
            permits_per_second,
            acquire_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn is_enabled(&self) -> bool {
        self.permits_per_second.is_some()
    }

    pub fn validate(&self) -> RateLimitResult<()> {
        match self.permits_per_second {
            Some(rate) if !rate.is_finite() || rate < 0.0 => Err(RateLimitError::config(format!(
                "permits per second must be a non-negative number, got {}",
                rate
            ))),
            _ => Ok(()),
        }
    }

    /// Create the limiter, or `None` when limiting is disabled
    pub fn build(&self) -> RateLimitResult<Option<RateLimiter>> {
        let Some(rate) = self.permits_per_second else {
            return Ok(None);
        };

        let mut limiter = RateLimiter::new(rate)?;
        if let Some(timeout) = self.acquire_timeout {
            limiter = limiter.with_acquire_timeout(timeout);
        }

        debug!(
            permits_per_second = rate,
            acquire_timeout = ?self.acquire_timeout,
            "Created rate limiter"
        );
        Ok(Some(limiter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_builds_nothing() {
        let config = RateLimitConfig::disabled();
        assert!(!config.is_enabled());
        assert!(config.build().unwrap().is_none());
        assert_eq!(config, RateLimitConfig::default());
    }

    #[test]
    fn test_from_parts() {
        let config = RateLimitConfig::from_parts(Some(100.0), Some(500)).unwrap();
        assert_eq!(config.permits_per_second, Some(100.0));
        assert_eq!(config.acquire_timeout, Some(Duration::from_nanos(500)));

        let limiter = config.build().unwrap().unwrap();
        assert_eq!(limiter.permits_per_second(), 100.0);
        assert_eq!(limiter.acquire_timeout(), Some(Duration::from_nanos(500)));
    }

    #[test]
    fn test_present_zero_is_enabled() {
        let config = RateLimitConfig::from_parts(Some(0.0), None).unwrap();
        assert!(config.is_enabled());

        let limiter = config.build().unwrap().unwrap();
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_invalid_parts() {
        assert!(RateLimitConfig::from_parts(Some(-5.0), None).is_err());
        assert!(RateLimitConfig::from_parts(Some(1.0), Some(-1)).is_err());
    }
}
