// Configuration management for Zeus applications

pub mod config_service;
pub mod env;
pub mod error;
pub mod loader;
pub mod placeholder;
pub mod validation;

pub use config_service::{ConfigService, ConfigServiceBuilder};
pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use placeholder::PlaceholderResolver;
pub use validation::{ConfigValidator, Validate};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use zeus_core::Provider;

/// Main configuration manager
///
/// Keys are stored flat; values loaded from files keep their nesting and are
/// reachable through dotted paths (`server.port`). Environment variables are
/// reachable through their relaxed form (`SERVER_PORT` answers `server.port`).
#[derive(Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<HashMap<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(HashMap::new())),
            env_prefix: None,
        }
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: String) -> Self {
        Self {
            config: Arc::new(RwLock::new(HashMap::new())),
            env_prefix: Some(prefix),
        }
    }

    /// Load configuration from environment variables
    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        let env_vars = loader.load()?;
        let count = env_vars.len();

        let mut config = self.config.write();
        for (key, value) in env_vars {
            config.insert(key, Value::String(value));
        }

        debug!(count, prefix = ?self.env_prefix, "Loaded environment variables");
        Ok(())
    }

    /// Load configuration from .env file, then the environment
    pub fn load_dotenv(&self, path: Option<&str>) -> Result<()> {
        if let Some(path) = path {
            dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
        } else {
            dotenvy::dotenv().ok(); // Ignore if .env doesn't exist
        }
        self.load_env()
    }

    /// Load configuration from file
    pub fn load_file(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        let path = path.as_ref();
        let data = ConfigLoader::new(format).load_file(path)?;
        self.merge_value(data);

        debug!(path = %path.display(), ?format, "Loaded configuration file");
        Ok(())
    }

    /// Merge the top-level entries of a JSON object into this manager
    pub fn merge_value(&self, data: Value) {
        if let Value::Object(map) = data {
            let mut config = self.config.write();
            for (key, value) in map {
                config.insert(key, value);
            }
        }
    }

    /// Set a configuration value
    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        self.config.write().insert(key.to_string(), json_value);
        Ok(())
    }

    /// Find the raw value for a key, following dotted paths into nested
    /// objects and falling back to the relaxed environment form
    pub fn get_value(&self, key: &str) -> Option<Value> {
        let config = self.config.read();

        if let Some(value) = config.get(key) {
            return Some(value.clone());
        }

        let mut segments = key.split('.');
        let nested = segments.next().and_then(|first| {
            segments.try_fold(config.get(first)?, |value, segment| value.get(segment))
        });
        if let Some(value) = nested {
            return Some(value.clone());
        }

        config.get(&env::relaxed_key(key)).cloned()
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .get_value(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Get a string value
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    /// Get an integer value
    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.get(key)
    }

    /// Get a boolean value
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    /// Get a float value
    pub fn get_float(&self, key: &str) -> Result<f64> {
        self.get(key)
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    /// Get all top-level configuration keys
    pub fn keys(&self) -> Vec<String> {
        self.config.read().keys().cloned().collect()
    }

    /// Merge configuration from another manager; `other` wins on conflicts
    pub fn merge(&self, other: &ConfigManager) {
        if Arc::ptr_eq(&self.config, &other.config) {
            return;
        }
        let other_config = other.config.read().clone();
        let mut config = self.config.write();

        for (key, value) in other_config {
            config.insert(key, value);
        }
    }

    /// Load and validate configuration
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let json_value = Value::Object(
            self.config
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );

        let validated: T = serde_json::from_value(json_value)
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;

        validated.validate()?;

        Ok(validated)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for ConfigManager {}

impl PlaceholderResolver for ConfigManager {
    fn lookup(&self, key: &str) -> Option<String> {
        match self.get_value(key)? {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let manager = ConfigManager::new();
        manager.set("test_key", "test_value").unwrap();

        let value: String = manager.get("test_key").unwrap();
        assert_eq!(value, "test_value");
    }

    #[test]
    fn test_get_or_default() {
        let manager = ConfigManager::new();

        let value: String = manager.get_or("missing_key", "default_value".to_string());
        assert_eq!(value, "default_value");
    }

    #[test]
    fn test_has_key() {
        let manager = ConfigManager::new();
        manager.set("existing_key", "value").unwrap();

        assert!(manager.has("existing_key"));
        assert!(!manager.has("missing_key"));
    }

    #[test]
    fn test_type_conversions() {
        let manager = ConfigManager::new();

        manager.set("string_key", "hello").unwrap();
        manager.set("int_key", 42i64).unwrap();
        manager.set("bool_key", true).unwrap();
        manager.set("float_key", 2.5).unwrap();

        assert_eq!(manager.get_string("string_key").unwrap(), "hello");
        assert_eq!(manager.get_int("int_key").unwrap(), 42);
        assert!(manager.get_bool("bool_key").unwrap());
        assert_eq!(manager.get_float("float_key").unwrap(), 2.5);
    }

    #[test]
    fn test_dotted_lookup_into_nested_values() {
        let manager = ConfigManager::new();
        manager.merge_value(serde_json::json!({
            "server": { "port": 8080, "hello": { "path": "/hello" } }
        }));

        assert_eq!(manager.get_int("server.port").unwrap(), 8080);
        assert_eq!(manager.get_string("server.hello.path").unwrap(), "/hello");
        assert!(!manager.has("server.missing"));
    }

    #[test]
    fn test_relaxed_env_style_lookup() {
        let manager = ConfigManager::new();
        manager.set("hello_instance_num", "3").unwrap();

        assert_eq!(manager.lookup("hello.instance-num"), Some("3".to_string()));
    }

    #[test]
    fn test_placeholder_lookup_renders_scalars() {
        let manager = ConfigManager::new();
        manager.set("port", 9090).unwrap();
        manager.set("rate", 12.5).unwrap();
        manager.set("enabled", false).unwrap();
        manager.set("nothing", Value::Null).unwrap();

        assert_eq!(manager.resolve("${port}").unwrap(), "9090");
        assert_eq!(manager.resolve("${rate}").unwrap(), "12.5");
        assert_eq!(manager.resolve("${enabled}").unwrap(), "false");
        assert_eq!(manager.resolve("${nothing:none}").unwrap(), "none");
    }

    #[test]
    fn test_merge_other_manager_wins() {
        let base = ConfigManager::new();
        base.set("a", 1).unwrap();
        base.set("b", 1).unwrap();

        let overrides = ConfigManager::new();
        overrides.set("b", 2).unwrap();

        base.merge(&overrides);
        assert_eq!(base.get_int("a").unwrap(), 1);
        assert_eq!(base.get_int("b").unwrap(), 2);

        base.merge(&base.clone());
        assert_eq!(base.keys().len(), 2);
    }
}
