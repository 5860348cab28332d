//! Error types for rate limiting

use std::time::Duration;
use thiserror::Error;

/// Result type for rate limiting operations
pub type RateLimitResult<T> = Result<T, RateLimitError>;

/// Rate limiting errors
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// No permit was available
    #[error("Rate limit exceeded. Retry after {retry_after:?}")]
    LimitExceeded {
        /// Time until a permit would be available, `None` when never
        retry_after: Option<Duration>,
    },

    /// A permit would only become available after the acquire timeout
    #[error("Could not acquire permit within {timeout:?} (needed {required:?})")]
    AcquireTimeout {
        timeout: Duration,
        required: Duration,
    },

    /// Configuration error
    #[error("Rate limit configuration error: {0}")]
    ConfigError(String),
}

impl RateLimitError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the request was refused for lack of permits
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, Self::LimitExceeded { .. } | Self::AcquireTimeout { .. })
    }

    /// Get the retry-after duration if one is known
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::LimitExceeded { retry_after } => *retry_after,
            Self::AcquireTimeout { required, .. } => Some(*required),
            Self::ConfigError(_) => None,
        }
    }

    /// Value for a `Retry-After` header, rounded up to whole seconds
    pub fn retry_after_header(&self) -> Option<String> {
        self.retry_after().map(|d| {
            let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
            secs.max(1).to_string()
        })
    }
}

impl From<RateLimitError> for zeus_core::Error {
    fn from(err: RateLimitError) -> Self {
        if err.is_limit_exceeded() {
            zeus_core::Error::TooManyRequests(err.to_string())
        } else {
            zeus_core::Error::Configuration(err.to_string())
        }
    }
}
