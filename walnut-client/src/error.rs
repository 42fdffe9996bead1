//! Errors surfaced by the driver.

use thiserror::Error;
use walnut_common::ErrorKind;

/// Result type for the driver.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors surfaced by the driver. Store failures are passed through verbatim.
#[derive(Debug, Error)]
pub enum DriverError {
    /// No connection handle installed yet.
    #[error("connection not established yet")]
    NotConnected,
    /// The store answered with a nil reply for a key or field.
    #[error("key not found")]
    NotFound,
    /// Network or IO failure while reading/writing, including socket timeouts.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The peer closed the connection.
    #[error("connection closed by peer")]
    Closed,
    /// RESP2 framing or parse error.
    #[error("protocol error")]
    Protocol,
    /// Store returned an error reply.
    #[error("server error: {0}")]
    Server(String),
    /// Response type did not match the expected command response.
    #[error("unexpected response")]
    UnexpectedResponse,
    /// Every pooled connection stayed busy for the whole pool timeout.
    #[error("timed out waiting for a pooled connection")]
    PoolTimeout,
    /// Address could not be resolved into a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    /// A bulk reply was not valid UTF-8.
    #[error("invalid utf-8 in reply")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

impl DriverError {
    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::NotConnected => ErrorKind::NotConnected,
            DriverError::NotFound => ErrorKind::NotFound,
            _ => ErrorKind::Transport,
        }
    }

    /// True when a read found no value, as opposed to an empty one.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::NotFound)
    }

    pub(crate) fn server(message: Vec<u8>) -> Self {
        DriverError::Server(String::from_utf8_lossy(&message).into_owned())
    }
}
