//! # Error Types
//!
//! Purpose: Classify failures across the workspace into a small set of kinds
//! callers can branch on, and carry the record-level errors.

use thiserror::Error;

/// Coarse classification shared by every error type in the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation attempted before a successful connect.
    NotConnected,
    /// Network, framing, timeout or server-reported failure.
    Transport,
    /// Key or field absent on a read that distinguishes miss from empty.
    NotFound,
    /// Malformed structured text on load.
    Serialization,
    /// A record failed field validation.
    Validation,
    /// Driver configuration could not be parsed or is inconsistent.
    Config,
}

/// Result type for record operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while loading, storing or validating records.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("validation failed: {0}")]
    Validation(String),
}

impl ModelError {
    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::Serialization(_) => ErrorKind::Serialization,
            ModelError::Validation(_) => ErrorKind::Validation,
        }
    }
}
