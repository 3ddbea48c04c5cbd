//! Client result types
//!
//! Outcomes of client-side transfer operations.

use crate::storage::FileDescriptor;

/// Result of an upload attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded(String),
    Denied(String),
}

/// Result of a completed download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub file: FileDescriptor,
}
