//! Verticle descriptors
//!
//! A descriptor is declared once per verticle type as a `const`, with every
//! field given as text that may contain `${key:default}` placeholders. It is
//! resolved against configuration right before the verticle is deployed.
//!
//! ```
//! use zeus_config::ConfigManager;
//! use zeus_verticle::VerticleDescriptor;
//!
//! const HELLO: VerticleDescriptor = VerticleDescriptor::new("${hello.port:8080}", "/hello")
//!     .with_instance_num("${hello.instances:2}")
//!     .with_permits_per_second("100");
//!
//! let resolved = HELLO.resolve(&ConfigManager::new()).unwrap();
//! assert_eq!(resolved.port, 8080);
//! assert_eq!(resolved.instances, 2);
//! assert_eq!(resolved.permits_per_second, Some(100.0));
//! assert_eq!(resolved.acquire_permits_timeout_nanos, None);
//! ```

use zeus_config::{ConfigError, ConfigValidator, PlaceholderResolver};
use zeus_ratelimit::{RateLimitConfig, RateLimitResult};

/// Marks a type as a deployable verticle and carries its descriptor
pub trait VerticleController {
    const DESCRIPTOR: VerticleDescriptor;
}

/// Deployment metadata declared on a verticle type.
///
/// An empty field is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerticleDescriptor {
    pub port: &'static str,
    pub path: &'static str,
    /// Defaults to `"1"`
    pub instance_num: &'static str,
    pub description: &'static str,
    pub permits_per_second: &'static str,
    pub acquire_permits_timeout_nanos: &'static str,
}

impl VerticleDescriptor {
    pub const fn new(port: &'static str, path: &'static str) -> Self {
        Self {
            port,
            path,
            instance_num: "1",
            description: "",
            permits_per_second: "",
            acquire_permits_timeout_nanos: "",
        }
    }

    pub const fn with_instance_num(mut self, instance_num: &'static str) -> Self {
        self.instance_num = instance_num;
        self
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_permits_per_second(mut self, permits_per_second: &'static str) -> Self {
        self.permits_per_second = permits_per_second;
        self
    }

    pub const fn with_acquire_permits_timeout_nanos(mut self, nanos: &'static str) -> Self {
        self.acquire_permits_timeout_nanos = nanos;
        self
    }

    /// Resolve every placeholder and validate the result
    pub fn resolve(&self, resolver: &dyn PlaceholderResolver) -> Result<ResolvedDescriptor, ConfigError> {
        let port = resolver
            .resolve_long(self.port)?
            .ok_or_else(|| ConfigError::ValidationError("port is required".to_string()))?;
        let port = ConfigValidator::port(port, "port")?;

        let path = resolver.resolve(self.path)?.trim().to_string();
        ConfigValidator::not_blank(&path, "path")?;
        ConfigValidator::route_path(&path, "path")?;

        let instances = resolver.resolve_int(self.instance_num)?.unwrap_or(1);
        ConfigValidator::in_range(instances, 1, i32::MAX, "instance_num")?;

        Ok(ResolvedDescriptor {
            port,
            path,
            instances: instances as usize,
            description: resolver.resolve(self.description)?,
            permits_per_second: resolver.resolve_double(self.permits_per_second)?,
            acquire_permits_timeout_nanos: resolver.resolve_long(self.acquire_permits_timeout_nanos)?,
        })
    }
}

/// A descriptor with every placeholder resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDescriptor {
    pub port: u16,
    pub path: String,
    pub instances: usize,
    pub description: String,
    /// `None` disables rate limiting; zero refuses every request
    pub permits_per_second: Option<f64>,
    pub acquire_permits_timeout_nanos: Option<i64>,
}

impl ResolvedDescriptor {
    /// The description, or `fallback` when none was given
    pub fn display_name<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.description.is_empty() {
            fallback
        } else {
            &self.description
        }
    }

    pub fn rate_limit(&self) -> RateLimitResult<RateLimitConfig> {
        RateLimitConfig::from_parts(self.permits_per_second, self.acquire_permits_timeout_nanos)
    }

    /// Whether a request path is served by this verticle.
    ///
    /// Trailing slashes are ignored; a path ending in `/*` matches everything
    /// below it.
    pub fn matches(&self, request_path: &str) -> bool {
        let request = normalize(request_path);
        match self.path.strip_suffix("/*") {
            Some(prefix) => {
                let prefix = normalize(prefix);
                prefix.is_empty()
                    || request == prefix
                    || request
                        .strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            None => request == normalize(&self.path),
        }
    }
}

fn normalize(path: &str) -> &str {
    path.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeus_config::ConfigManager;

    const PLAIN: VerticleDescriptor = VerticleDescriptor::new("8080", "/hello");

    fn config() -> ConfigManager {
        let config = ConfigManager::new();
        config.set("hello.port", 9000).unwrap();
        config.set("hello.instances", "4").unwrap();
        config.set("hello.rate", 100.0).unwrap();
        config.set("hello.timeout", 500).unwrap();
        config.set("hello.name", "Hello service").unwrap();
        config
    }

    #[test]
    fn test_defaults() {
        assert_eq!(PLAIN.instance_num, "1");
        let resolved = PLAIN.resolve(&ConfigManager::new()).unwrap();
        assert_eq!(resolved.port, 8080);
        assert_eq!(resolved.path, "/hello");
        assert_eq!(resolved.instances, 1);
        assert_eq!(resolved.description, "");
        assert_eq!(resolved.permits_per_second, None);
        assert_eq!(resolved.acquire_permits_timeout_nanos, None);
        assert!(!resolved.rate_limit().unwrap().is_enabled());
    }

    #[test]
    fn test_placeholders_resolved() {
        let descriptor = VerticleDescriptor::new("${hello.port}", "/${hello.segment:greet}")
            .with_instance_num("${hello.instances}")
            .with_description("${hello.name}")
            .with_permits_per_second("${hello.rate}")
            .with_acquire_permits_timeout_nanos("${hello.timeout}");

        let resolved = descriptor.resolve(&config()).unwrap();
        assert_eq!(resolved.port, 9000);
        assert_eq!(resolved.path, "/greet");
        assert_eq!(resolved.instances, 4);
        assert_eq!(resolved.description, "Hello service");
        assert_eq!(resolved.permits_per_second, Some(100.0));
        assert_eq!(resolved.acquire_permits_timeout_nanos, Some(500));
    }

    #[test]
    fn test_blank_rate_limit_is_absent() {
        let descriptor = PLAIN.with_permits_per_second("${hello.missing:}");
        let resolved = descriptor.resolve(&config()).unwrap();
        assert_eq!(resolved.permits_per_second, None);
    }

    #[test]
    fn test_present_zero_rate_limit() {
        let resolved = PLAIN.with_permits_per_second("0").resolve(&config()).unwrap();
        assert_eq!(resolved.permits_per_second, Some(0.0));
        assert!(resolved.rate_limit().unwrap().is_enabled());
    }

    #[test]
    fn test_invalid_values() {
        let config = config();
        assert!(VerticleDescriptor::new("", "/x").resolve(&config).is_err());
        assert!(VerticleDescriptor::new("70000", "/x").resolve(&config).is_err());
        assert!(VerticleDescriptor::new("80", "x").resolve(&config).is_err());
        assert!(VerticleDescriptor::new("80", "/x").with_instance_num("0").resolve(&config).is_err());
        assert!(VerticleDescriptor::new("80", "/x").with_instance_num("many").resolve(&config).is_err());
        assert!(matches!(
            VerticleDescriptor::new("${nope}", "/x").resolve(&config),
            Err(ConfigError::UnresolvablePlaceholder { .. })
        ));
    }

    #[test]
    fn test_display_name_falls_back() {
        let resolved = PLAIN.resolve(&ConfigManager::new()).unwrap();
        assert_eq!(resolved.display_name("app::Hello"), "app::Hello");

        let described = PLAIN.with_description("Greeter").resolve(&ConfigManager::new()).unwrap();
        assert_eq!(described.display_name("app::Hello"), "Greeter");
    }

    #[test]
    fn test_path_matching() {
        let resolved = PLAIN.resolve(&ConfigManager::new()).unwrap();
        assert!(resolved.matches("/hello"));
        assert!(resolved.matches("/hello/"));
        assert!(!resolved.matches("/hello/world"));
        assert!(!resolved.matches("/hellothere"));

        let wildcard = VerticleDescriptor::new("80", "/api/*")
            .resolve(&ConfigManager::new())
            .unwrap();
        assert!(wildcard.matches("/api"));
        assert!(wildcard.matches("/api/users/1"));
        assert!(!wildcard.matches("/apis"));
    }
}
