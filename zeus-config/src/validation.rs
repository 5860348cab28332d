// Configuration validation

use crate::{ConfigError, Result};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Validation rules shared by configuration consumers
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not blank
    pub fn not_blank(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a number is within an inclusive range
    pub fn in_range<T: PartialOrd + std::fmt::Display>(
        value: T,
        min: T,
        max: T,
        field: &str,
    ) -> Result<()> {
        if value < min || value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be between {} and {}, got {}",
                field, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate and narrow a port number
    pub fn port(value: i64, field: &str) -> Result<u16> {
        match u16::try_from(value) {
            Ok(port) if port != 0 => Ok(port),
            _ => Err(ConfigError::ValidationError(format!(
                "{} must be a valid port number, got {}",
                field, value
            ))),
        }
    }

    /// Validate that a routing path is absolute
    pub fn route_path(value: &str, field: &str) -> Result<()> {
        if !value.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "{} must start with '/', got \"{}\"",
                field, value
            )));
        }
        Ok(())
    }
}
