//! Read side of a framed connection

use log::warn;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use crate::error::ConnectionError;

type BoxedRead = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Up-front allocation cap for raw reads; larger payloads grow as they arrive
const MAX_PREALLOCATION: usize = 16 * 1024 * 1024;

/// Reads newline-terminated command lines.
pub struct CommandReader {
    inner: BufReader<BoxedRead>,
    max_command_length: usize,
}

impl CommandReader {
    pub fn new(read_half: BoxedRead, max_command_length: usize) -> Self {
        Self {
            inner: BufReader::new(read_half),
            max_command_length,
        }
    }

    /// Reads the next command line without its terminator.
    ///
    /// Returns `Ok(None)` on a clean end of stream. A final line without a
    /// trailing newline is still returned. Lines longer than the configured
    /// limit are drained through their newline and reported as
    /// [`ConnectionError::LineTooLong`]. Invalid UTF-8 is replaced lossily.
    pub async fn read_command(&mut self) -> Result<Option<String>, ConnectionError> {
        let limit = self.max_command_length;
        let mut buf = Vec::new();

        // Room for the limit plus a CRLF terminator
        let n = (&mut self.inner)
            .take(limit as u64 + 2)
            .read_until(b'\n', &mut buf)
            .await?;
        if n == 0 {
            return Ok(None);
        }

        let terminated = buf.last() == Some(&b'\n');
        if terminated {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }

        if buf.len() > limit {
            if !terminated {
                self.discard_rest_of_line().await?;
            }
            return Err(ConnectionError::LineTooLong { limit });
        }

        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    async fn discard_rest_of_line(&mut self) -> Result<(), ConnectionError> {
        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    self.inner.consume(pos + 1);
                    return Ok(());
                }
                None => {
                    let len = available.len();
                    self.inner.consume(len);
                }
            }
        }
    }

    /// Enters a raw-byte phase. No command can be read until the returned
    /// reader is dropped.
    pub fn raw(&mut self) -> RawReader<'_> {
        RawReader {
            inner: &mut self.inner,
        }
    }
}

/// Outcome of an exact-count raw read.
#[derive(Debug)]
pub struct RawRead {
    pub bytes: Vec<u8>,
    pub expected: u64,
}

impl RawRead {
    pub fn received(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_complete(&self) -> bool {
        self.received() == self.expected
    }
}

/// Reads exact byte counts from the same buffered stream the command reader uses.
pub struct RawReader<'a> {
    inner: &'a mut BufReader<BoxedRead>,
}

impl RawReader<'_> {
    /// Reads until `expected` bytes are collected or the stream ends or fails.
    ///
    /// Never reads past `expected`, so bytes that follow the payload stay
    /// buffered for the next command line. A stream error mid-payload is
    /// logged and reported as a short read.
    pub async fn read_exact_or_short(&mut self, expected: u64, chunk_size: usize) -> RawRead {
        let capacity = expected.min(MAX_PREALLOCATION as u64) as usize;
        let mut bytes = Vec::with_capacity(capacity);
        let mut chunk = vec![0u8; chunk_size.max(1)];

        while (bytes.len() as u64) < expected {
            let remaining = expected - bytes.len() as u64;
            let want = chunk.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            match self.inner.read(&mut chunk[..want]).await {
                Ok(0) => break,
                Ok(n) => bytes.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    warn!(
                        "Raw read failed after {} of {} bytes: {}",
                        bytes.len(),
                        expected,
                        e
                    );
                    break;
                }
            }
        }

        RawRead { bytes, expected }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, duplex};

    fn reader_for(stream: tokio::io::DuplexStream, limit: usize) -> CommandReader {
        CommandReader::new(Box::new(stream), limit)
    }

    #[tokio::test]
    async fn reads_lines_and_eof() {
        let (server, mut client) = duplex(256);
        let mut reader = reader_for(server, 64);

        client.write_all(b"LIST\r\nEXIT\nPARTIAL").await.unwrap();
        drop(client);

        assert_eq!(reader.read_command().await.unwrap().as_deref(), Some("LIST"));
        assert_eq!(reader.read_command().await.unwrap().as_deref(), Some("EXIT"));
        assert_eq!(reader.read_command().await.unwrap().as_deref(), Some("PARTIAL"));
        assert_eq!(reader.read_command().await.unwrap(), None);
    }

    #[tokio::test]
    async fn over_long_line_is_drained() {
        let (server, mut client) = duplex(1024);
        let mut reader = reader_for(server, 8);

        client.write_all(b"CHAT|this line is far too long\nLIST\n").await.unwrap();

        let err = reader.read_command().await.unwrap_err();
        assert!(matches!(err, ConnectionError::LineTooLong { limit: 8 }));
        assert!(err.is_recoverable());
        assert_eq!(reader.read_command().await.unwrap().as_deref(), Some("LIST"));
    }

    #[tokio::test]
    async fn line_at_exact_limit_is_accepted() {
        let (server, mut client) = duplex(64);
        let mut reader = reader_for(server, 4);

        client.write_all(b"LIST\nLIST\r\nCHAT|\nLIST\n").await.unwrap();
        assert_eq!(reader.read_command().await.unwrap().as_deref(), Some("LIST"));
        assert_eq!(reader.read_command().await.unwrap().as_deref(), Some("LIST"));
        assert!(reader.read_command().await.is_err());
        assert_eq!(reader.read_command().await.unwrap().as_deref(), Some("LIST"));
    }

    #[tokio::test]
    async fn short_raw_read_reports_count() {
        let (server, mut client) = duplex(64);
        let mut reader = reader_for(server, 64);

        client.write_all(b"abc").await.unwrap();
        drop(client);

        let read = reader.raw().read_exact_or_short(10, 4).await;
        assert!(!read.is_complete());
        assert_eq!(read.received(), 3);
        assert_eq!(read.bytes, b"abc");
    }

    #[tokio::test]
    async fn zero_length_raw_read_is_complete() {
        let (server, _client) = duplex(64);
        let mut reader = reader_for(server, 64);

        let read = reader.raw().read_exact_or_short(0, 4).await;
        assert!(read.is_complete());
        assert!(read.bytes.is_empty());
    }
}
