use crate::domain::error::DmmResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Byte-level duplex link to the instrument.
///
/// Framing and command semantics live above this trait. Implementations
/// must observe their [`CloseHandle`]: once it is closed, pending and
/// future calls fail with [`DmmError::NotConnected`](crate::DmmError::NotConnected).
#[async_trait]
pub trait Transport: Send {
    /// Write all bytes, blocking up to transport buffering limits.
    async fn send(&mut self, data: &[u8]) -> DmmResult<()>;

    /// Read available bytes into `buf`, waiting at most `timeout`.
    ///
    /// Returns `Ok(0)` when the peer closed the stream and
    /// [`DmmError::Timeout`](crate::DmmError::Timeout) when nothing arrived in time.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> DmmResult<usize>;

    /// Handle that lets another task close this transport.
    fn close_handle(&self) -> CloseHandle;

    /// Release the underlying connection.
    async fn shutdown(&mut self) -> DmmResult<()>;
}

/// Shared close switch between a transport and whoever owns the session.
///
/// Closing is idempotent and may race with an in-flight read or write.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CloseHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn close(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once [`close`](CloseHandle::close) has been called.
    pub async fn closed(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives in `self`, so this only ends when the flag is set.
        let _ = receiver.wait_for(|closed| *closed).await;
    }
}

impl Default for CloseHandle {
    fn default() -> Self {
        Self::new()
    }
}
