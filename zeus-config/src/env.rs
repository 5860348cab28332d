// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Relaxed form of a property name: `hello.port` and `hello-port` both
/// become `hello_port`, the way a `HELLO_PORT` variable is stored.
pub fn relaxed_key(property: &str) -> String {
    property.replace(['.', '-'], "_").to_lowercase()
}

/// Reads process environment variables as configuration properties
///
/// With a prefix of `ZEUS`, the variable `ZEUS_HELLO_PORT` is loaded as
/// `hello_port` and answers lookups of `hello.port`. Variables without the
/// prefix are ignored.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Snapshot of the matching variables, keyed by relaxed property name
    pub fn load(&self) -> Result<HashMap<String, String>> {
        let vars = env::vars().filter_map(|(key, value)| {
            let name = match &self.prefix {
                Some(prefix) => key.strip_prefix(prefix.as_str())?.strip_prefix('_')?,
                None => key.as_str(),
            };
            (!name.is_empty()).then(|| (name.to_lowercase(), value))
        });

        Ok(vars.collect())
    }

    /// The variable a property would be read from
    pub fn var_name(&self, property: &str) -> String {
        let name = relaxed_key(property).to_uppercase();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, name),
            None => name,
        }
    }

    /// Read one property straight from the environment
    pub fn load_var(&self, property: &str) -> Result<String> {
        env::var(self.var_name(property)).map_err(ConfigError::EnvError)
    }

    pub fn load_var_or(&self, property: &str, default: &str) -> String {
        self.load_var(property).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}
