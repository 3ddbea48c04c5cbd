//! Error types
//!
//! Defines domain-specific error types for each part of the room server.

use std::io;
use thiserror::Error;

/// Failures of the underlying byte stream. These end the connection task.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The line was consumed through its newline; the stream is still usable.
    #[error("Command line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("Connection closed by peer")]
    Closed,
}

impl ConnectionError {
    /// Whether the connection can keep serving commands after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ConnectionError::LineTooLong { .. })
    }
}

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid password for user: {0}")]
    InvalidPassword(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),
}

/// File store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Raw-byte transfer errors
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Transfer incomplete: received {received} of {expected} bytes")]
    Incomplete { expected: u64, received: u64 },

    #[error("Declared size {declared} exceeds limit of {limit} bytes")]
    TooLarge { declared: u64, limit: u64 },
}

/// General server error returned from startup and the accept loop
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Failed to bind to {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors surfaced by the client library
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Not logged in")]
    NotLoggedIn,
}
