//! Error types for claude-guard.

use std::io;
use thiserror::Error;

/// Result type alias for claude-guard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in claude-guard operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage I/O error.
    #[error("Storage error: {0}")]
    Storage(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Session ID that cannot be used as a storage key.
    #[error("Invalid session ID: {0:?}")]
    InvalidSessionId(String),

    /// Session not found.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Invalid command-line argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
