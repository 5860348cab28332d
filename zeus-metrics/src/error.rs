//! Metrics errors

use thiserror::Error;

/// Result type for metrics operations
pub type Result<T> = std::result::Result<T, MetricsError>;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Invalid meter name: {0:?}")]
    InvalidName(String),

    #[error("Meter {name} is already registered as a {existing}")]
    TypeMismatch { name: String, existing: &'static str },
}

impl From<MetricsError> for zeus_core::Error {
    fn from(err: MetricsError) -> Self {
        zeus_core::Error::Internal(err.to_string())
    }
}
