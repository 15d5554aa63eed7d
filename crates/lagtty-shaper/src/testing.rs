//! Test instrumentation for shaper pipelines.
//!
//! These helpers let tests observe what the shaper actually writes: each
//! individual write with its timestamp, so assertions can cover write
//! boundaries and pacing, not just the concatenated bytes. They live in the
//! library (not under `#[cfg(test)]`) so integration tests and downstream
//! crates can reuse them.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Instant;

/// One write captured by a [`RecordingWriter`].
#[derive(Debug, Clone)]
pub struct WriteRecord {
    /// When the write arrived.
    pub at: Instant,
    /// The exact bytes of this single write.
    pub data: Vec<u8>,
}

/// Shared log of writes, inspectable after the shaper has consumed the
/// writer itself.
#[derive(Debug, Clone, Default)]
pub struct WriteLog {
    records: Arc<Mutex<Vec<WriteRecord>>>,
}

impl WriteLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer that appends every write to this log.
    pub fn recorder(&self) -> RecordingWriter {
        RecordingWriter {
            records: Arc::clone(&self.records),
        }
    }

    /// Snapshot of all writes so far.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.records.lock().expect("write log poisoned").clone()
    }

    /// All written bytes concatenated in order.
    pub fn concat(&self) -> Vec<u8> {
        self.writes().iter().flat_map(|w| w.data.clone()).collect()
    }

    /// Number of individual writes.
    pub fn write_count(&self) -> usize {
        self.records.lock().expect("write log poisoned").len()
    }

    /// Length of the largest individual write (0 when empty).
    pub fn max_write_len(&self) -> usize {
        self.writes().iter().map(|w| w.data.len()).max().unwrap_or(0)
    }
}

/// An `AsyncWrite` that records each write and always succeeds.
pub struct RecordingWriter {
    records: Arc<Mutex<Vec<WriteRecord>>>,
}

impl AsyncWrite for RecordingWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.records.lock().expect("write log poisoned").push(WriteRecord {
            at: Instant::now(),
            data: buf.to_vec(),
        });
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// An `AsyncWrite` that fails every write with the given error kind.
pub struct FailingWriter {
    kind: io::ErrorKind,
}

impl FailingWriter {
    pub fn new(kind: io::ErrorKind) -> Self {
        Self { kind }
    }
}

impl AsyncWrite for FailingWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::from(self.kind)))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// An `AsyncRead` that yields its payload once and then fails with the
/// given error kind, for exercising the source-error path.
pub struct ErroringReader {
    payload: Option<Vec<u8>>,
    kind: io::ErrorKind,
}

impl ErroringReader {
    pub fn new(payload: impl Into<Vec<u8>>, kind: io::ErrorKind) -> Self {
        Self {
            payload: Some(payload.into()),
            kind,
        }
    }
}

impl AsyncRead for ErroringReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.payload.take() {
            Some(data) => {
                buf.put_slice(&data);
                Poll::Ready(Ok(()))
            }
            None => Poll::Ready(Err(io::Error::from(self.kind))),
        }
    }
}
