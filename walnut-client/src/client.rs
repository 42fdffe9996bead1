//! # Store Driver
//!
//! Purpose: Expose a compact, blocking API over one lazily established,
//! pooled connection handle to the remote key-value store.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `RedisDriver` hides pooling and protocol details.
//! 2. **Explicit Lifecycle**: Nothing touches the network before `connect`.
//! 3. **Pass-Through**: No local caching; every read is a round trip and
//!    every store failure is returned to the caller.
//! 4. **Shared Handle**: Operations take `&self` and may run concurrently;
//!    the pool bounds how many are in flight.

use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::{ConfigResult, DriverConfig};
use crate::error::{DriverError, DriverResult};
use crate::pool::{ConnectionPool, PoolStats, PooledConnection};
use crate::resp::RespValue;

/// Driver for one configured store target.
///
/// Each driver owns at most one live connection handle. Independent drivers
/// never share state, so several targets can coexist in one process.
pub struct RedisDriver {
    config: DriverConfig,
    handle: RwLock<Option<ConnectionPool>>,
}

impl RedisDriver {
    /// Creates a driver for `address`, authenticating with `password` when
    /// non-empty and selecting `database`.
    pub fn new(address: impl Into<String>, password: impl Into<String>, database: i64) -> Self {
        Self::with_config(DriverConfig::new(address, password, database))
    }

    /// Creates a driver from an explicit configuration.
    pub fn with_config(config: DriverConfig) -> Self {
        RedisDriver {
            config,
            handle: RwLock::new(None),
        }
    }

    /// Creates a driver configured from `WALNUT_REDIS_*` variables.
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self::with_config(DriverConfig::from_env()?))
    }

    /// Returns the configuration this driver connects with.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Establishes the connection handle.
    ///
    /// A no-op when the installed handle already answers a health check.
    /// Otherwise a new handle is built and installed only if it answers one;
    /// on failure no handle is left installed.
    pub fn connect(&self) -> DriverResult<()> {
        if self.ping().is_ok() {
            return Ok(());
        }

        let pool = ConnectionPool::new(self.config.clone());
        match ping_pool(&pool) {
            Ok(()) => {
                *self.handle.write() = Some(pool);
                debug!(
                    address = %self.config.address,
                    database = self.config.database,
                    pool_size = self.config.pool_size,
                    "connected to store"
                );
                Ok(())
            }
            Err(err) => {
                *self.handle.write() = None;
                warn!(address = %self.config.address, error = %err, "store connect failed");
                Err(err)
            }
        }
    }

    /// Checks the installed handle with a PING round trip.
    pub fn ping(&self) -> DriverResult<()> {
        ping_pool(&self.pool()?)
    }

    /// Returns pool occupancy, or `None` before a successful connect.
    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.handle.read().as_ref().map(ConnectionPool::stats)
    }

    pub(crate) fn pool(&self) -> DriverResult<ConnectionPool> {
        self.handle.read().clone().ok_or(DriverError::NotConnected)
    }

    pub(crate) fn conn(&self) -> DriverResult<PooledConnection> {
        self.pool()?.acquire()
    }

    /// Stores `value` under `key`, expiring after `ttl` when given.
    ///
    /// A zero `ttl` means no expiration. Returns true when the store
    /// acknowledged the write with `OK`.
    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> DriverResult<bool> {
        let mut conn = self.conn()?;
        let reply = match ttl.filter(|ttl| !ttl.is_zero()) {
            Some(ttl) => {
                let (unit, amount) = expiration_args(ttl);
                conn.exec(&[b"SET", key.as_bytes(), value.as_bytes(), unit, amount.as_bytes()])?
            }
            None => conn.exec(&[b"SET", key.as_bytes(), value.as_bytes()])?,
        };
        match reply {
            RespValue::Simple(status) => Ok(status == b"OK"),
            RespValue::Bulk(None) => Ok(false),
            RespValue::Error(message) => Err(DriverError::server(message)),
            _ => Err(DriverError::UnexpectedResponse),
        }
    }

    /// Fetches the value of `key`.
    ///
    /// A missing key is `DriverError::NotFound`; an empty value is `Ok("")`.
    pub fn get(&self, key: &str) -> DriverResult<String> {
        let mut conn = self.conn()?;
        text_reply(conn.exec(&[b"GET", key.as_bytes()])?)
    }

    /// Reports whether `key` exists.
    pub fn exists(&self, key: &str) -> DriverResult<bool> {
        let mut conn = self.conn()?;
        Ok(integer_reply(conn.exec(&[b"EXISTS", key.as_bytes()])?)? > 0)
    }

    /// Deletes `key`. Returns the number of keys removed.
    pub fn del(&self, key: &str) -> DriverResult<i64> {
        let mut conn = self.conn()?;
        integer_reply(conn.exec(&[b"DEL", key.as_bytes()])?)
    }
}

fn ping_pool(pool: &ConnectionPool) -> DriverResult<()> {
    let mut conn = pool.acquire()?;
    match conn.exec(&[b"PING"])? {
        RespValue::Simple(_) | RespValue::Bulk(Some(_)) => Ok(()),
        RespValue::Error(message) => Err(DriverError::server(message)),
        _ => Err(DriverError::UnexpectedResponse),
    }
}

/// Whole seconds go out as `EX`, anything finer as `PX`.
fn expiration_args(ttl: Duration) -> (&'static [u8], String) {
    if ttl.subsec_nanos() == 0 {
        (&b"EX"[..], ttl.as_secs().to_string())
    } else {
        // Round up so a sub-millisecond TTL never becomes 0.
        let millis = (ttl.as_nanos() + 999_999) / 1_000_000;
        (&b"PX"[..], millis.to_string())
    }
}

pub(crate) fn text_reply(reply: RespValue) -> DriverResult<String> {
    match reply {
        RespValue::Bulk(None) => Err(DriverError::NotFound),
        other => other.into_text(),
    }
}

pub(crate) fn integer_reply(reply: RespValue) -> DriverResult<i64> {
    match reply {
        RespValue::Integer(value) => Ok(value),
        RespValue::Error(message) => Err(DriverError::server(message)),
        _ => Err(DriverError::UnexpectedResponse),
    }
}
