//! # Zeus Rate Limiting
//!
//! Permit-based rate limiting applied per verticle.
//!
//! ```rust
//! use zeus_ratelimit::RateLimitConfig;
//! use std::time::Duration;
//!
//! let config = RateLimitConfig::per_second(100.0)
//!     .with_acquire_timeout(Duration::from_millis(5));
//!
//! let limiter = config.build().unwrap().expect("limiting is enabled");
//! assert!(limiter.try_acquire());
//!
//! assert!(zeus_ratelimit::RateLimitConfig::disabled().build().unwrap().is_none());
//!
//! // Waits for a permit when one frees up within the acquire timeout
//! # tokio_test::block_on(async {
//! limiter.acquire().await.unwrap();
//! # });
//! ```

pub mod config;
pub mod error;
pub mod limiter;

pub use config::RateLimitConfig;
pub use error::{RateLimitError, RateLimitResult};
pub use limiter::RateLimiter;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::RateLimitConfig;
    pub use crate::error::{RateLimitError, RateLimitResult};
    pub use crate::limiter::RateLimiter;
}
