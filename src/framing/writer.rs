//! Write side of a framed connection

use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard};

use crate::error::ConnectionError;

type BoxedWrite = Box<dyn AsyncWrite + Send + Sync + Unpin>;

/// Cloneable handle to a connection's write half.
///
/// The owning session and the registry (for broadcast) both hold one.
#[derive(Clone)]
pub struct ConnectionWriter {
    inner: Arc<Mutex<BoxedWrite>>,
}

impl ConnectionWriter {
    pub fn new(write_half: BoxedWrite) -> Self {
        Self {
            inner: Arc::new(Mutex::new(write_half)),
        }
    }

    /// Writes one command line followed by `\n` and flushes.
    pub async fn write_command(&self, line: &str) -> Result<(), ConnectionError> {
        let mut guard = self.inner.lock().await;
        write_line(&mut guard, line).await?;
        guard.flush().await?;
        Ok(())
    }

    /// Locks the writer for a metadata line plus raw body.
    pub async fn begin_transfer(&self) -> TransferWriter<'_> {
        TransferWriter {
            guard: self.inner.lock().await,
        }
    }

    /// Shuts down the write half, signalling end of stream to the peer.
    pub async fn shutdown(&self) -> Result<(), ConnectionError> {
        self.inner.lock().await.shutdown().await?;
        Ok(())
    }
}

/// Exclusive access to the writer for the duration of one transfer.
pub struct TransferWriter<'a> {
    guard: MutexGuard<'a, BoxedWrite>,
}

impl TransferWriter<'_> {
    pub async fn write_command(&mut self, line: &str) -> Result<(), ConnectionError> {
        write_line(&mut self.guard, line).await
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), ConnectionError> {
        self.guard.write_all(bytes).await?;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<(), ConnectionError> {
        self.guard.flush().await?;
        Ok(())
    }
}

async fn write_line(out: &mut BoxedWrite, line: &str) -> Result<(), ConnectionError> {
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    Ok(())
}
