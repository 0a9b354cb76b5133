use crate::core::communication::transport::{CloseHandle, Transport};
use crate::domain::error::{DmmError, DmmResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Transport over any async byte stream.
///
/// The stream is dropped, and the socket with it, the first time the
/// transport observes its close handle or is shut down.
pub struct StreamTransport<S> {
    stream: Option<S>,
    label: String,
    close: CloseHandle,
}

/// TCP transport to the instrument's raw socket port
pub type TcpTransport = StreamTransport<TcpStream>;

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already connected stream; `label` is used in logs
    pub fn new(stream: S, label: String) -> Self {
        Self {
            stream: Some(stream),
            label,
            close: CloseHandle::new(),
        }
    }

    fn stream_mut(&mut self) -> DmmResult<&mut S> {
        if self.close.is_closed() {
            self.stream = None;
        }
        self.stream.as_mut().ok_or(DmmError::NotConnected)
    }
}

impl StreamTransport<TcpStream> {
    /// Connect with a timeout.
    ///
    /// Nagle is disabled since every command is a short line.
    pub async fn connect(address: &str, timeout: Duration) -> DmmResult<Self> {
        debug!("Connecting to {} (timeout {} ms)", address, timeout.as_millis());

        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| DmmError::Connect {
                address: address.to_string(),
                message: format!("connection timeout after {} ms", timeout.as_millis()),
            })?
            .map_err(|e| DmmError::Connect {
                address: address.to_string(),
                message: e.to_string(),
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        info!("TCP connection established to {}", address);
        Ok(Self::new(stream, address.to_string()))
    }

    pub fn peer_addr(&self) -> Option<std::net::SocketAddr> {
        self.stream.as_ref().and_then(|s| s.peer_addr().ok())
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, data: &[u8]) -> DmmResult<()> {
        let close = self.close.clone();
        let label = self.label.clone();
        let stream = self.stream_mut()?;

        let result = tokio::select! {
            biased;
            _ = close.closed() => Err(DmmError::NotConnected),
            written = async {
                stream.write_all(data).await?;
                stream.flush().await
            } => written.map_err(DmmError::from),
        };

        match &result {
            Ok(()) => trace!("Sent {} bytes to {}", data.len(), label),
            Err(DmmError::NotConnected) => self.stream = None,
            Err(e) => debug!("Write to {} failed: {}", label, e),
        }
        result
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> DmmResult<usize> {
        let close = self.close.clone();
        let label = self.label.clone();
        let stream = self.stream_mut()?;

        let result = tokio::select! {
            biased;
            _ = close.closed() => Err(DmmError::NotConnected),
            read = tokio::time::timeout(timeout, stream.read(buf)) => match read {
                Ok(Ok(n)) => Ok(n),
                Ok(Err(e)) => Err(DmmError::from(e)),
                Err(_) => Err(DmmError::Timeout),
            },
        };

        match &result {
            Ok(0) => debug!("Connection to {} closed by peer", label),
            Ok(n) => trace!("Received {} bytes from {}", n, label),
            Err(DmmError::NotConnected) => self.stream = None,
            Err(_) => {}
        }
        result
    }

    fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    async fn shutdown(&mut self) -> DmmResult<()> {
        self.close.close();
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!("Failed to shutdown stream to {}: {}", self.label, e);
            }
            info!("Connection to {} closed", self.label);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_refused_is_connect_error() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = TcpTransport::connect(&addr.to_string(), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(DmmError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_send_and_receive_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(&buf[..n]).await.unwrap();
        });

        let mut transport = TcpTransport::connect(&addr.to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(transport.peer_addr().is_some());

        transport.send(b"*CLS\n").await.unwrap();
        let mut buf = [0u8; 64];
        let n = transport.receive(&mut buf, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&buf[..n], b"*CLS\n");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_interrupts_pending_receive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let mut transport = TcpTransport::connect(&addr.to_string(), Duration::from_secs(1))
            .await
            .unwrap();
        let close = transport.close_handle();

        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            let result = transport.receive(&mut buf, Duration::from_secs(5)).await;
            let after = transport.send(b"*RST\n").await;
            (result, after)
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        close.close();

        let (result, after) = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(DmmError::NotConnected)));
        assert!(matches!(after, Err(DmmError::NotConnected)));
    }
}
