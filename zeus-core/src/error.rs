// Error types for the Zeus framework

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Dependency injection error: {0}")]
    DependencyInjection(String),

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Lifecycle listener failed: {0}")]
    Lifecycle(String),

    /// A listener failure that keeps the listener's own error type
    #[error("Lifecycle listener failed: {0}")]
    Listener(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Too Many Requests: {0}")]
    TooManyRequests(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn listener(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Listener(Box::new(err))
    }

    /// HTTP status code a verticle should answer with for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::BadRequest(_) | Error::Deserialization(_) => 400,
            Error::NotFound(_) => 404,
            Error::TooManyRequests(_) => 429,
            _ => 500,
        }
    }

    /// Whether this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
