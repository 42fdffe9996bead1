//! Field-scoped operations on hashes stored under a key.

use crate::client::{integer_reply, text_reply, RedisDriver};
use crate::error::{DriverError, DriverResult};
use crate::resp::RespValue;

impl RedisDriver {
    /// Fetches `field` of the hash at `key`.
    ///
    /// A missing key or field is `DriverError::NotFound`.
    pub fn hget(&self, key: &str, field: &str) -> DriverResult<String> {
        let mut conn = self.conn()?;
        text_reply(conn.exec(&[b"HGET", key.as_bytes(), field.as_bytes()])?)
    }

    /// Sets `field` of the hash at `key`.
    ///
    /// Returns true when the field was created and false when an existing
    /// field was overwritten, as reported by the store.
    pub fn hset(&self, key: &str, field: &str, value: &str) -> DriverResult<bool> {
        let mut conn = self.conn()?;
        match conn.exec(&[b"HSET", key.as_bytes(), field.as_bytes(), value.as_bytes()])? {
            RespValue::Integer(added) => Ok(added == 1),
            RespValue::Error(message) => Err(DriverError::server(message)),
            _ => Err(DriverError::UnexpectedResponse),
        }
    }

    /// Reports whether `field` exists in the hash at `key`.
    pub fn hexists(&self, key: &str, field: &str) -> DriverResult<bool> {
        let mut conn = self.conn()?;
        Ok(integer_reply(conn.exec(&[b"HEXISTS", key.as_bytes(), field.as_bytes()])?)? == 1)
    }

    /// Removes `field` from the hash at `key`. Returns the number of fields removed.
    pub fn hdel(&self, key: &str, field: &str) -> DriverResult<i64> {
        let mut conn = self.conn()?;
        integer_reply(conn.exec(&[b"HDEL", key.as_bytes(), field.as_bytes()])?)
    }

    /// Counts the fields of the hash at `key`; 0 when the key is missing.
    pub fn hlen(&self, key: &str) -> DriverResult<i64> {
        let mut conn = self.conn()?;
        integer_reply(conn.exec(&[b"HLEN", key.as_bytes()])?)
    }

    /// Deletes the whole hash at `key`. Returns the number of keys removed.
    pub fn htruncate(&self, key: &str) -> DriverResult<i64> {
        let mut conn = self.conn()?;
        integer_reply(conn.exec(&[b"DEL", key.as_bytes()])?)
    }
}
