// Error types for configuration management

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration key not found: {0}")]
    KeyNotFound(String),

    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Could not resolve placeholder '{placeholder}' in value \"{value}\"")]
    UnresolvablePlaceholder { placeholder: String, value: String },

    #[error("Circular placeholder reference '{0}'")]
    CircularPlaceholder(String),

    #[error("Unterminated placeholder in value \"{0}\"")]
    MalformedPlaceholder(String),

    #[error("Value \"{value}\" is not a valid {target}")]
    InvalidValue { value: String, target: &'static str },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvError(#[from] std::env::VarError),
}

impl From<ConfigError> for zeus_core::Error {
    fn from(err: ConfigError) -> Self {
        zeus_core::Error::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
