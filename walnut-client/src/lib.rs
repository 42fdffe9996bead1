//! # Walnut Store Driver
//!
//! Purpose: Provide a blocking driver for the remote key-value and
//! publish/subscribe store that caches Walnut's options and credentials.
//!
//! ## Design Principles
//! 1. **One Handle per Target**: A `RedisDriver` owns at most one pooled
//!    connection handle, established by an idempotent `connect`.
//! 2. **Stateless Pass-Through**: Values are never cached locally.
//! 3. **Errors Are Returned**: Store failures reach the caller with their
//!    kind; a miss is `NotFound`, never an empty string.
//! 4. **Protocol Clarity**: Encode/parse RESP2 explicitly for correctness.
//!
//! ## Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use walnut_client::RedisDriver;
//!
//! # fn main() -> Result<(), walnut_client::DriverError> {
//! let driver = RedisDriver::new("127.0.0.1:6379", "", 0);
//! driver.connect()?;
//! driver.set("walnut:app_name", "walnut", Some(Duration::from_secs(60)))?;
//! driver.hset("walnut:options", "theme", "dark")?;
//! for entry in driver.hscan_iter("walnut:options", "", 100) {
//!     let (field, value) = entry?;
//!     println!("{field} = {value}");
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod hash;
mod pool;
mod pubsub;
mod resp;
mod scan;

pub use client::RedisDriver;
pub use config::{
    ConfigError, ConfigResult, DriverConfig, DEFAULT_POOL_SIZE, DEFAULT_POOL_TIMEOUT, ENV_ADDRESS,
    ENV_DATABASE, ENV_PASSWORD, ENV_POOL_SIZE, ENV_POOL_TIMEOUT_SECS,
};
pub use error::{DriverError, DriverResult};
pub use pool::PoolStats;
pub use pubsub::{Message, Subscription};
pub use scan::{HashScan, ScanCursor, ScanPage};
pub use walnut_common::ErrorKind;
