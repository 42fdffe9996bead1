//! # Driver Configuration
//!
//! Purpose: Describe how to reach the remote store and how to size the
//! connection pool, loaded from defaults, environment variables or JSON.
//!
//! Precedence is the caller's choice: `from_env` and `from_json` both start
//! from `DriverConfig::default()` and overwrite only what they find.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use walnut_common::ErrorKind;

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// Default wait for a free pooled connection.
pub const DEFAULT_POOL_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_ADDRESS: &str = "WALNUT_REDIS_ADDRESS";
pub const ENV_PASSWORD: &str = "WALNUT_REDIS_PASSWORD";
pub const ENV_DATABASE: &str = "WALNUT_REDIS_DATABASE";
pub const ENV_POOL_SIZE: &str = "WALNUT_REDIS_POOL_SIZE";
pub const ENV_POOL_TIMEOUT_SECS: &str = "WALNUT_REDIS_POOL_TIMEOUT_SECS";

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Config
    }

    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Connection settings for the driver and its pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Store address, e.g. "127.0.0.1:6379". Host names are resolved.
    pub address: String,
    /// Password sent with AUTH; empty disables authentication.
    pub password: String,
    /// Logical database selected on every new connection.
    pub database: i64,
    /// Maximum total connections (idle + in-use).
    pub pool_size: usize,
    /// How long a caller waits for a free connection.
    pub pool_timeout: Duration,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional TCP read timeout for pooled connections.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            address: "127.0.0.1:6379".to_string(),
            password: String::new(),
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
            pool_timeout: DEFAULT_POOL_TIMEOUT,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// JSON shape of the configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    address: Option<String>,
    password: Option<String>,
    database: Option<i64>,
    pool_size: Option<usize>,
    pool_timeout_secs: Option<u64>,
    connect_timeout_ms: Option<u64>,
    read_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
}

impl DriverConfig {
    /// Builds a configuration for one target with default pool settings.
    pub fn new(address: impl Into<String>, password: impl Into<String>, database: i64) -> Self {
        DriverConfig {
            address: address.into(),
            password: password.into(),
            database,
            ..Default::default()
        }
    }

    /// Reads `WALNUT_REDIS_*` environment variables over the defaults.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env`, with an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(address) = lookup(ENV_ADDRESS) {
            config.address = address;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            config.password = password;
        }
        if let Some(database) = lookup(ENV_DATABASE) {
            config.database = parse_number(ENV_DATABASE, &database)?;
        }
        if let Some(size) = lookup(ENV_POOL_SIZE) {
            config.pool_size = parse_number(ENV_POOL_SIZE, &size)?;
        }
        if let Some(secs) = lookup(ENV_POOL_TIMEOUT_SECS) {
            config.pool_timeout = Duration::from_secs(parse_number(ENV_POOL_TIMEOUT_SECS, &secs)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON object with snake_case keys over the defaults.
    pub fn from_json(text: &str) -> ConfigResult<Self> {
        let file: FileConfig = serde_json::from_str(text)?;
        let mut config = Self::default();

        if let Some(address) = file.address {
            config.address = address;
        }
        if let Some(password) = file.password {
            config.password = password;
        }
        if let Some(database) = file.database {
            config.database = database;
        }
        if let Some(size) = file.pool_size {
            config.pool_size = size;
        }
        if let Some(secs) = file.pool_timeout_secs {
            config.pool_timeout = Duration::from_secs(secs);
        }
        config.connect_timeout = file.connect_timeout_ms.map(Duration::from_millis);
        config.read_timeout = file.read_timeout_ms.map(Duration::from_millis);
        config.write_timeout = file.write_timeout_ms.map(Duration::from_millis);

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the pool cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::invalid("address", "must not be empty"));
        }
        if self.pool_size == 0 {
            return Err(ConfigError::invalid("pool_size", "must be at least 1"));
        }
        if self.database < 0 {
            return Err(ConfigError::invalid("database", "must not be negative"));
        }
        let socket_timeouts = [
            ("connect_timeout", self.connect_timeout),
            ("read_timeout", self.read_timeout),
            ("write_timeout", self.write_timeout),
        ];
        for (field, timeout) in socket_timeouts {
            // Sockets refuse a zero timeout; leave it unset to block instead.
            if timeout.is_some_and(|timeout| timeout.is_zero()) {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> ConfigResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, format!("{:?} is not a number", raw)))
}
