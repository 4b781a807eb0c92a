//! Runtime configuration.
//!
//! Configuration is read from pluggable [`ConfigSource`]s. The environment
//! source is always available; JSON documents are supported with the
//! `config` feature.

use std::collections::HashMap;
use std::env;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default prefix for environment variables read by [`RuntimeConfig::from_env`].
pub const DEFAULT_ENV_PREFIX: &str = "FERROUS_EFFECT";

/// Errors raised while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A key holds a value of the wrong type
    #[error("Config key `{key}` expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
    },
    /// A JSON document could not be parsed
    #[error("Invalid configuration document: {0}")]
    Parse(String),
}

/// A configuration value that can be various types
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(untagged))]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl ConfigValue {
    /// Parses a raw string the way environment values are interpreted.
    pub fn parse(raw: &str) -> Self {
        if let Ok(int_val) = raw.parse::<i64>() {
            ConfigValue::Integer(int_val)
        } else if let Ok(bool_val) = raw.to_ascii_lowercase().parse::<bool>() {
            ConfigValue::Boolean(bool_val)
        } else {
            ConfigValue::String(raw.to_string())
        }
    }

    /// The value as text; integers and booleans are rendered as written.
    pub fn into_string(self) -> String {
        match self {
            ConfigValue::String(s) => s,
            ConfigValue::Integer(i) => i.to_string(),
            ConfigValue::Boolean(b) => b.to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Booleans also accept `0`/`1` and `yes`/`no`/`on`/`off`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            ConfigValue::Integer(0) => Some(false),
            ConfigValue::Integer(1) => Some(true),
            ConfigValue::String(s) => match s.to_ascii_lowercase().as_str() {
                "yes" | "on" => Some(true),
                "no" | "off" => Some(false),
                _ => None,
            },
            ConfigValue::Integer(_) => None,
        }
    }
}

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    /// Get a configuration value by key
    fn get(&self, key: &str) -> Option<ConfigValue>;
}

/// Environment variable configuration source
///
/// Keys are upper-cased and joined to the prefix with `_`, so `echo_logs`
/// under prefix `APP` reads `APP_ECHO_LOGS`.
#[derive(Debug, Default)]
pub struct EnvironmentConfigSource {
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: Some(prefix.into()) }
    }

    fn env_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        env::var(self.env_key(key)).ok().map(|value| ConfigValue::parse(&value))
    }
}

/// In-memory configuration source
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: HashMap<String, ConfigValue>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }
}

/// Settings shared by every fiber a [`Runtime`](crate::Runtime) starts.
///
/// # Examples
///
/// ```
/// use ferrous_effect::{MapConfigSource, ConfigValue, RuntimeConfig};
///
/// let source = MapConfigSource::new()
///     .set("label", ConfigValue::String("worker".to_string()))
///     .set("echo_logs", ConfigValue::Boolean(true));
///
/// let config = RuntimeConfig::load(&source).unwrap();
/// assert_eq!(config.label, "worker");
/// assert!(config.echo_logs);
/// assert!(config.catch_panics);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct RuntimeConfig {
    /// Name attached to tracing events
    pub label: String,
    /// Turn panics inside thunks into `Defect::Panic` instead of unwinding
    pub catch_panics: bool,
    /// Echo `Effect::log` lines through `tracing` at `info`
    pub echo_logs: bool,
    /// Check the cancellation token at every effect boundary
    pub check_interrupts: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            label: "ferrous-effect".to_string(),
            catch_panics: true,
            echo_logs: false,
            check_interrupts: true,
        }
    }
}

impl RuntimeConfig {
    /// Loads every known key from `source`, keeping defaults for absent keys.
    pub fn load(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            label: source
                .get("label")
                .map(ConfigValue::into_string)
                .unwrap_or(defaults.label),
            catch_panics: read_bool(source, "catch_panics", defaults.catch_panics)?,
            echo_logs: read_bool(source, "echo_logs", defaults.echo_logs)?,
            check_interrupts: read_bool(source, "check_interrupts", defaults.check_interrupts)?,
        })
    }

    /// Loads from `FERROUS_EFFECT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        Self::load(&EnvironmentConfigSource::with_prefix(prefix))
    }

    /// Parses a JSON document; absent fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(document).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    pub fn with_echo_logs(mut self, enabled: bool) -> Self {
        self.echo_logs = enabled;
        self
    }

    pub fn with_check_interrupts(mut self, enabled: bool) -> Self {
        self.check_interrupts = enabled;
        self
    }
}

fn read_bool(source: &dyn ConfigSource, key: &str, default: bool) -> Result<bool, ConfigError> {
    match source.get(key) {
        None => Ok(default),
        Some(value) => value.as_bool().ok_or_else(|| mismatch(key, "a boolean", &value)),
    }
}

fn mismatch(key: &str, expected: &'static str, found: &ConfigValue) -> ConfigError {
    tracing::warn!(key, ?found, "rejecting configuration value");
    ConfigError::TypeMismatch { key: key.to_string(), expected }
}
