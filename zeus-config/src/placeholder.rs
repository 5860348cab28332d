//! Placeholder resolution.
//!
//! Values may contain `${key}` or `${key:default}` expressions. Placeholders
//! can be embedded in literal text (`http://${host}:${port}`), nested in
//! keys (`${${env}.port}`) and in defaults (`${a:${b:1}}`). A resolved value
//! is itself resolved again, and a placeholder that refers back to itself,
//! directly or through other keys, is rejected.
//!
//! ```
//! use zeus_config::{ConfigManager, PlaceholderResolver};
//!
//! let config = ConfigManager::new();
//! config.set("hello.instances", 4).unwrap();
//!
//! assert_eq!(config.resolve_int("${hello.instances}").unwrap(), Some(4));
//! assert_eq!(config.resolve_int("${missing:2}").unwrap(), Some(2));
//! assert_eq!(config.resolve_double("").unwrap(), None);
//! ```

use crate::{ConfigError, Result};

const PREFIX: &str = "${";
const SUFFIX: char = '}';
const SEPARATOR: char = ':';

/// Resolves placeholder expressions against a source of configuration values.
///
/// Implementors only supply [`lookup`](PlaceholderResolver::lookup); the
/// typed helpers treat a value that resolves to blank text as absent.
pub trait PlaceholderResolver: Send + Sync {
    /// Raw value for a key, or `None` when the key is unknown
    fn lookup(&self, key: &str) -> Option<String>;

    /// Resolve every placeholder in `text`
    fn resolve(&self, text: &str) -> Result<String> {
        let mut visiting = Vec::new();
        parse(text, &|key: &str| self.lookup(key), &mut visiting)
    }

    /// Resolve to a 32-bit integer, `None` when blank
    fn resolve_int(&self, text: &str) -> Result<Option<i32>> {
        parse_typed(&self.resolve(text)?, "integer")
    }

    /// Resolve to a 64-bit integer, `None` when blank
    fn resolve_long(&self, text: &str) -> Result<Option<i64>> {
        parse_typed(&self.resolve(text)?, "long")
    }

    /// Resolve to a floating point number, `None` when blank
    fn resolve_double(&self, text: &str) -> Result<Option<f64>> {
        parse_typed(&self.resolve(text)?, "double")
    }
}

fn parse_typed<T: std::str::FromStr>(resolved: &str, target: &'static str) -> Result<Option<T>> {
    let trimmed = resolved.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            value: trimmed.to_string(),
            target,
        })
}

fn parse(
    text: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
    visiting: &mut Vec<String>,
) -> Result<String> {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(PREFIX) {
        result.push_str(&rest[..start]);
        let body = &rest[start + PREFIX.len()..];
        let end =
            find_placeholder_end(body).ok_or_else(|| ConfigError::MalformedPlaceholder(text.to_string()))?;
        let raw = &body[..end];

        let (raw_key, raw_default) = match split_default(raw) {
            Some((key, default)) => (key, Some(default)),
            None => (raw, None),
        };
        let key = parse(raw_key, lookup, visiting)?;

        let value = match (lookup(&key), raw_default) {
            (Some(value), _) => {
                if visiting.contains(&key) {
                    return Err(ConfigError::CircularPlaceholder(key));
                }
                visiting.push(key);
                let resolved = parse(&value, lookup, visiting);
                visiting.pop();
                resolved?
            }
            (None, Some(default)) => parse(default, lookup, visiting)?,
            (None, None) => {
                return Err(ConfigError::UnresolvablePlaceholder {
                    placeholder: key,
                    value: text.to_string(),
                });
            }
        };

        result.push_str(&value);
        rest = &body[end + SUFFIX.len_utf8()..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Index of the `}` closing the placeholder whose body starts at `body`
fn find_placeholder_end(body: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        if body[i..].starts_with(PREFIX) {
            depth += 1;
            chars.next();
        } else if c == SUFFIX {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        }
    }
    None
}

/// Split `key:default` on the first separator outside nested placeholders
fn split_default(raw: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut chars = raw.char_indices();

    while let Some((i, c)) = chars.next() {
        if raw[i..].starts_with(PREFIX) {
            depth += 1;
            chars.next();
        } else if c == SUFFIX {
            depth = depth.saturating_sub(1);
        } else if c == SEPARATOR && depth == 0 {
            return Some((&raw[..i], &raw[i + 1..]));
        }
    }
    None
}
