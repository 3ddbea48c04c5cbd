//! Length-prefixed binary streaming shared by upload and download.
//!
//! The engine never interprets payload bytes and never reads command lines.
//! Callers announce the length in a metadata line; the engine moves exactly
//! that many bytes.

use log::{debug, warn};

use crate::error::{ConnectionError, TransferError};
use crate::framing::{CommandReader, ConnectionWriter, RawRead};

/// Writes a metadata line and the raw body while holding the writer lock.
///
/// The header must announce `body.len()` bytes (`FILE_INFO|name|len` from the
/// server, `UPLOAD_START` after an accepted `UPLOAD_REQUEST` from a client).
pub async fn send(
    writer: &ConnectionWriter,
    header: &str,
    body: &[u8],
    chunk_size: usize,
) -> Result<(), ConnectionError> {
    let mut transfer = writer.begin_transfer().await;
    transfer.write_command(header).await?;
    for chunk in body.chunks(chunk_size.max(1)) {
        transfer.write_raw(chunk).await?;
    }
    transfer.finish().await?;
    debug!("Sent {} raw bytes after {:?}", body.len(), header);
    Ok(())
}

/// Reads exactly `expected` bytes, or whatever arrived before the stream ended.
pub async fn receive(reader: &mut CommandReader, expected: u64, chunk_size: usize) -> RawRead {
    let read = reader.raw().read_exact_or_short(expected, chunk_size).await;
    if !read.is_complete() {
        warn!(
            "Transfer incomplete: received {} of {} bytes",
            read.received(),
            expected
        );
    }
    read
}

impl RawRead {
    /// Converts a read into its bytes, failing the transfer if it came up short.
    pub fn into_complete(self) -> Result<Vec<u8>, TransferError> {
        if self.is_complete() {
            Ok(self.bytes)
        } else {
            Err(TransferError::Incomplete {
                expected: self.expected,
                received: self.received(),
            })
        }
    }
}

/// Rejects declared lengths above `limit` before any raw phase starts.
pub fn check_declared_length(declared: u64, limit: u64) -> Result<(), TransferError> {
    if declared > limit {
        return Err(TransferError::TooLarge { declared, limit });
    }
    Ok(())
}
