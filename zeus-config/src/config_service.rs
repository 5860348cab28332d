// ConfigService - layered configuration assembled at startup

use crate::{ConfigManager, FileFormat, PlaceholderResolver, Result};
use serde::de::DeserializeOwned;
use std::path::PathBuf;

/// High-level configuration service
#[derive(Clone)]
pub struct ConfigService {
    manager: ConfigManager,
}

impl ConfigService {
    /// Create from an existing manager
    pub fn from_manager(manager: ConfigManager) -> Self {
        Self { manager }
    }

    /// Builder for creating configured service
    pub fn builder() -> ConfigServiceBuilder {
        ConfigServiceBuilder::new()
    }

    /// Get configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.manager.get(key)
    }

    /// Get configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.manager.get_or(key, default)
    }

    /// Resolve placeholders in a value
    pub fn resolve(&self, text: &str) -> Result<String> {
        self.manager.resolve(text)
    }

    /// Get underlying manager
    pub fn manager(&self) -> &ConfigManager {
        &self.manager
    }

    /// Consume the service, returning the manager
    pub fn into_manager(self) -> ConfigManager {
        self.manager
    }
}

/// Builder for ConfigService.
///
/// Sources are applied in a fixed order, later sources overriding earlier
/// ones: files (in the order added), `.env`, then the process environment.
pub struct ConfigServiceBuilder {
    manager: ConfigManager,
    load_env: bool,
    load_dotenv: bool,
    dotenv_path: Option<String>,
    config_files: Vec<(PathBuf, Option<FileFormat>)>,
    defaults: Vec<(String, serde_json::Value)>,
}

impl ConfigServiceBuilder {
    pub fn new() -> Self {
        Self {
            manager: ConfigManager::new(),
            load_env: false,
            load_dotenv: false,
            dotenv_path: None,
            config_files: Vec::new(),
            defaults: Vec::new(),
        }
    }

    /// Set environment variable prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.manager = ConfigManager::with_prefix(prefix.into());
        self
    }

    /// Enable loading from environment variables
    pub fn load_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Enable loading from .env file
    pub fn load_dotenv(mut self, path: Option<String>) -> Self {
        self.load_dotenv = true;
        self.dotenv_path = path;
        self
    }

    /// Add a configuration file with an explicit format
    pub fn add_file(mut self, path: impl Into<PathBuf>, format: FileFormat) -> Self {
        self.config_files.push((path.into(), Some(format)));
        self
    }

    /// Add a configuration file, detecting the format from its extension
    pub fn add_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_files.push((path.into(), None));
        self
    }

    /// Set a value used when no source provides the key
    pub fn default_value(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.defaults.push((key.into(), value.into()));
        self
    }

    /// Build the configuration service
    pub fn build(self) -> Result<ConfigService> {
        for (key, value) in self.defaults {
            self.manager.set(&key, value)?;
        }

        for (path, format) in self.config_files {
            let format = match format {
                Some(format) => format,
                None => FileFormat::from_path(&path)?,
            };
            self.manager.load_file(&path, format)?;
        }

        if self.load_dotenv {
            self.manager.load_dotenv(self.dotenv_path.as_deref())?;
        } else if self.load_env {
            self.manager.load_env()?;
        }

        Ok(ConfigService::from_manager(self.manager))
    }
}

impl Default for ConfigServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
