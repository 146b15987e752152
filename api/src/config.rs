//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use shared::ingest::CategorySet;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

/// Default request body limit (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Errors raised while loading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set to a value that cannot be parsed.
    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue {
        /// The environment variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The category list contained no usable names.
    #[error("PULSEBOX_METRIC_CATEGORIES must name at least one category")]
    NoCategories,
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `PULSEBOX_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `PULSEBOX_PORT`: The port to listen on (default: 8080)
/// - `PULSEBOX_DATABASE_URL`: `SQLite` database URL (default: "sqlite://metrics.db")
/// - `PULSEBOX_MAX_CONNECTIONS`: Connection pool size (default: 5)
/// - `PULSEBOX_METRIC_CATEGORIES`: Comma-separated categories to store (default: "system,weather")
/// - `PULSEBOX_MAX_BODY_BYTES`: Request body limit in bytes (default: 1048576)
/// - `PULSEBOX_LOG_FORMAT`: "pretty" or "json" (default: "pretty")
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// `SQLite` database URL.
    pub database_url: String,
    /// Maximum number of pooled database connections.
    pub max_connections: u32,
    /// Metric categories that are persisted.
    pub categories: CategorySet,
    /// Maximum accepted request body size.
    pub max_body_bytes: usize,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or if the
    /// category list is empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates a configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let categories = match lookup("PULSEBOX_METRIC_CATEGORIES") {
            Some(list) => {
                let categories = CategorySet::parse(&list);
                if categories.is_empty() {
                    return Err(ConfigError::NoCategories);
                }
                categories
            }
            None => defaults.categories,
        };

        let config = Self {
            host: lookup("PULSEBOX_HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PULSEBOX_PORT")?.unwrap_or(defaults.port),
            database_url: lookup("PULSEBOX_DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: parse_var(&lookup, "PULSEBOX_MAX_CONNECTIONS")?
                .unwrap_or(defaults.max_connections),
            categories,
            max_body_bytes: parse_var(&lookup, "PULSEBOX_MAX_BODY_BYTES")?
                .unwrap_or(defaults.max_body_bytes),
            log_format: parse_var(&lookup, "PULSEBOX_LOG_FORMAT")?.unwrap_or(defaults.log_format),
        };

        config.socket_addr()?;
        Ok(config)
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for `PULSEBOX_HOST` if the host is
    /// not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                name: "PULSEBOX_HOST",
                value: self.host.clone(),
            })
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidValue { name, value })
        })
        .transpose()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "sqlite://metrics.db".to_string(),
            max_connections: 5,
            categories: CategorySet::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_format: LogFormat::Pretty,
        }
    }
}
