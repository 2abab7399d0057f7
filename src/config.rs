//! Configuration Loading
//!
//! The server reads a single YAML file once at startup. Every field has a
//! default, so an empty document yields a working configuration.
//!
//! ```yaml
//! engine:
//!   type: in_memory
//! network:
//!   address: "127.0.0.1:3223"
//!   max_connections: 10
//!   max_message_size: "4KB"
//!   idle_timeout: 5s
//! logging:
//!   level: info
//!   output: stdout
//! ```
//!
//! Durations use the compact `1h30m`, `5s`, `250ms` notation. Sizes accept
//! `B`, `KB` and `MB` suffixes (1024-based) or a bare byte count.

use crate::connection::ConnectionLimits;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default listen address
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:3223";

/// Default connection cap
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Default maximum request line size in bytes
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4 * 1024;

/// Default idle timeout
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// The only supported engine type
pub const ENGINE_IN_MEMORY: &str = "in_memory";

/// Errors that can occur while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for this schema
    #[error("error parsing config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

/// Storage engine selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: ENGINE_IN_MEMORY.to_string(),
        }
    }
}

/// Listener and per-connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind, `host:port`
    pub address: String,
    /// Hard cap on simultaneously handled connections
    pub max_connections: usize,
    /// Longest accepted request line
    #[serde(deserialize_with = "deserialize_size")]
    pub max_message_size: usize,
    /// How long a connection may sit without sending a request
    #[serde(deserialize_with = "deserialize_duration")]
    pub idle_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl NetworkConfig {
    /// The limits applied to every connection.
    pub fn limits(&self) -> ConnectionLimits {
        ConnectionLimits {
            idle_timeout: self.idle_timeout,
            max_message_size: self.max_message_size,
        }
    }
}

/// Logger settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub level: String,
    /// `stdout`, `stderr`, or a file path to append to
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "stdout".to_string(),
        }
    }
}

impl Config {
    /// Reads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Parses and validates a configuration document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that the schema alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.kind != ENGINE_IN_MEMORY {
            return Err(ConfigError::Invalid(format!(
                "unsupported engine type '{}'",
                self.engine.kind
            )));
        }
        if self.network.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "network.max_connections must be greater than 0".into(),
            ));
        }
        if u32::try_from(self.network.max_connections).is_err() {
            return Err(ConfigError::Invalid(format!(
                "network.max_connections must be at most {}",
                u32::MAX
            )));
        }
        if self.network.max_message_size == 0 {
            return Err(ConfigError::Invalid(
                "network.max_message_size must be greater than 0".into(),
            ));
        }
        if self.network.idle_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "network.idle_timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Parses a duration such as `5s`, `250ms`, `5m` or `1h30m`.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| format!("missing unit in duration '{}'", input))?;
        if digits == 0 {
            return Err(format!("invalid duration '{}'", input));
        }
        let value: f64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid number in duration '{}'", input))?;

        let unit_len = rest[digits..]
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len() - digits);
        let unit = &rest[digits..digits + unit_len];
        let nanos_per_unit: f64 = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(format!("unknown unit '{}' in duration '{}'", unit, input)),
        };

        let nanos = value * nanos_per_unit;
        total = (nanos <= u64::MAX as f64)
            .then(|| Duration::from_nanos(nanos as u64))
            .and_then(|part| total.checked_add(part))
            .ok_or_else(|| format!("duration '{}' is out of range", input))?;
        rest = &rest[digits + unit_len..];
    }

    Ok(total)
}

/// Parses a size such as `4KB`, `1MB`, `512B` or `2048`.
pub fn parse_size(input: &str) -> Result<usize, String> {
    let s = input.trim().to_ascii_uppercase();
    let (number, multiplier) = if let Some(n) = s.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = s.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('B') {
        (n, 1)
    } else {
        (s.as_str(), 1)
    };

    number
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| format!("invalid size '{}'", input))
}

/// A YAML scalar that may be written either as a number or a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(u64),
    Text(String),
}

/// Bare numbers are seconds.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match Scalar::deserialize(deserializer)? {
        Scalar::Number(secs) => Ok(Duration::from_secs(secs)),
        Scalar::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

/// Bare numbers are bytes.
fn deserialize_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match Scalar::deserialize(deserializer)? {
        Scalar::Number(bytes) => usize::try_from(bytes).map_err(serde::de::Error::custom),
        Scalar::Text(text) => parse_size(&text).map_err(serde::de::Error::custom),
    }
}
