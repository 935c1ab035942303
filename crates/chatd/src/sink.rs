//! Shared, line-oriented write half of a client transport.
//!
//! A `LineSink` is owned by its session but cloned into the registry so
//! other sessions can deliver messages to it. Writers are serialized by an
//! async mutex; every write is bounded by a timeout so a stalled client can
//! only delay the sender that is writing to it.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Write failures are returned as `SinkError`

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

/// Write timeout (10 seconds)
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Type-erased write half of a transport.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Cheap-to-clone handle for writing whole lines to one client.
#[derive(Clone)]
pub struct LineSink {
    inner: Arc<SinkInner>,
}

struct SinkInner {
    writer: Mutex<BufWriter<BoxedWriter>>,
    closed: AtomicBool,
    write_timeout: Duration,
}

impl LineSink {
    /// Wraps the write half of a transport using [`WRITE_TIMEOUT`].
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::with_write_timeout(writer, WRITE_TIMEOUT)
    }

    /// Wraps the write half of a transport with a custom write timeout.
    pub fn with_write_timeout<W>(writer: W, write_timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let boxed: BoxedWriter = Box::new(writer);
        Self {
            inner: Arc::new(SinkInner {
                writer: Mutex::new(BufWriter::new(boxed)),
                closed: AtomicBool::new(false),
                write_timeout,
            }),
        }
    }

    /// Writes `line` followed by `\n` and flushes.
    ///
    /// # Errors
    ///
    /// - `SinkError::Closed` if the owning session already closed the sink
    /// - `SinkError::Io` if the transport reported an error
    /// - `SinkError::WriteTimeout` if the write did not finish in time
    pub async fn send_line(&self, line: &str) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }

        let mut writer = self.inner.writer.lock().await;

        // Re-check under the lock: close() may have won the race
        if self.is_closed() {
            return Err(SinkError::Closed);
        }

        match timeout(self.inner.write_timeout, async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
            Ok::<(), std::io::Error>(())
        })
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SinkError::Io(e.to_string())),
            Err(_) => Err(SinkError::WriteTimeout),
        }
    }

    /// Flushes pending output and shuts the transport down.
    ///
    /// Idempotent. Later `send_line` calls fail with `SinkError::Closed`.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut writer = self.inner.writer.lock().await;
        let shutdown = timeout(self.inner.write_timeout, writer.shutdown()).await;
        match shutdown {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Transport shutdown failed"),
            Err(_) => debug!("Transport shutdown timed out"),
        }
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Returns true if both handles refer to the same transport.
    pub fn same_transport(&self, other: &LineSink) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for LineSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineSink")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Errors that can occur when writing to a client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("transport already closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("write timeout")]
    WriteTimeout,
}
