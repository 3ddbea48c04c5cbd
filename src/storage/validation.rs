//! File name validation
//!
//! The store is flat: names are single path components that also have to
//! survive the pipe- and comma-delimited wire format.

use crate::error::StorageError;

const FORBIDDEN_CHARS: [char; 7] = ['/', '\\', '\0', '|', ',', '\r', '\n'];

/// Validates a client-supplied file name, returning it unchanged if usable.
pub fn validate_file_name(name: &str) -> Result<&str, StorageError> {
    if name.is_empty() || name.starts_with('.') || name.contains(FORBIDDEN_CHARS) {
        return Err(StorageError::InvalidFileName(name.to_string()));
    }
    Ok(name)
}
