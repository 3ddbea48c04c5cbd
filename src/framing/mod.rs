//! Framed connection
//!
//! One byte stream carries two kinds of traffic: newline-terminated command
//! lines and raw payloads whose exact length was announced beforehand. The
//! read side hands out a [`RawReader`] that mutably borrows the
//! [`CommandReader`], so a command line can never be read while a raw phase
//! is open. The write side is shared with the session registry; a
//! [`TransferWriter`] holds the writer lock for a whole header-plus-body
//! sequence so broadcast lines cannot land inside a payload.

pub mod reader;
pub mod writer;

pub use reader::{CommandReader, RawRead, RawReader};
pub use writer::{ConnectionWriter, TransferWriter};

use tokio::io::{AsyncRead, AsyncWrite};

/// Splits a stream into its command reader and shareable writer.
pub fn framed<S>(stream: S, max_command_length: usize) -> (CommandReader, ConnectionWriter)
where
    S: AsyncRead + AsyncWrite + Send + Sync + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    (
        CommandReader::new(Box::new(read_half), max_command_length),
        ConnectionWriter::new(Box::new(write_half)),
    )
}
