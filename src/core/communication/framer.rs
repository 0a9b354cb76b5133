use crate::core::communication::transport::Transport;
use crate::domain::error::{DmmError, DmmResult};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

const READ_CHUNK_SIZE: usize = 1024;

/// Splits the instrument's byte stream into `\n`-terminated response lines.
///
/// Bytes that follow a delimiter in the same read are kept and served by the
/// next call, so a second line arriving in one chunk is never lost.
#[derive(Debug, Default)]
pub struct ResponseFramer {
    pending: Vec<u8>,
}

impl ResponseFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes received beyond the last returned line
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Read exactly one line, without its delimiter.
    ///
    /// The whole attempt shares one deadline of `timeout`. On timeout or
    /// closure the partial fragment is dropped and nothing is returned.
    pub async fn read_response<T>(&mut self, transport: &mut T, timeout: Duration) -> DmmResult<String>
    where
        T: Transport + ?Sized,
    {
        let deadline = Instant::now() + timeout;
        let mut scanned = 0;
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            if let Some(pos) = self.pending[scanned..].iter().position(|&b| b == b'\n') {
                let end = scanned + pos;
                let line = String::from_utf8_lossy(&self.pending[..end]).into_owned();
                self.pending.drain(..=end);
                trace!("Framed response of {} bytes, {} carried over", end, self.pending.len());
                return Ok(line);
            }
            scanned = self.pending.len();

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.pending.clear();
                return Err(DmmError::Timeout);
            }

            match transport.receive(&mut chunk, remaining).await {
                Ok(0) => {
                    self.pending.clear();
                    return Err(DmmError::ConnectionClosed);
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    self.pending.clear();
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::tcp::client::StreamTransport;
    use tokio_test::io::Builder;

    fn scripted(builder: &mut Builder) -> StreamTransport<tokio_test::io::Mock> {
        StreamTransport::new(builder.build(), "mock".to_string())
    }

    #[tokio::test]
    async fn test_reassembles_split_response() {
        let mut transport = scripted(Builder::new().read(b"12.3").read(b",45\n"));
        let mut framer = ResponseFramer::new();

        let line = framer
            .read_response(&mut transport, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(line, "12.3,45");
        assert_eq!(framer.buffered(), 0);
    }

    #[tokio::test]
    async fn test_carries_over_second_line_in_same_chunk() {
        let mut transport = scripted(Builder::new().read(b"+1.0E+00,t1\n+2.0E+00,t2\n"));
        let mut framer = ResponseFramer::new();

        let first = framer
            .read_response(&mut transport, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(first, "+1.0E+00,t1");
        assert_eq!(framer.buffered(), "+2.0E+00,t2\n".len());

        let second = framer
            .read_response(&mut transport, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(second, "+2.0E+00,t2");
    }

    #[tokio::test]
    async fn test_carried_fragment_joins_next_read() {
        let mut transport = scripted(Builder::new().read(b"a\nb").read(b"c\n"));
        let mut framer = ResponseFramer::new();

        assert_eq!(
            framer.read_response(&mut transport, Duration::from_secs(1)).await.unwrap(),
            "a"
        );
        assert_eq!(
            framer.read_response(&mut transport, Duration::from_secs(1)).await.unwrap(),
            "bc"
        );
    }

    #[tokio::test]
    async fn test_timeout_returns_no_partial_data() {
        let mut transport = scripted(
            Builder::new()
                .read(b"12.")
                .wait(Duration::from_millis(300)),
        );
        let mut framer = ResponseFramer::new();

        let result = framer
            .read_response(&mut transport, Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(DmmError::Timeout)));
        assert_eq!(framer.buffered(), 0);
    }

    #[tokio::test]
    async fn test_zero_byte_read_is_closure() {
        let mut transport = scripted(Builder::new().read(b"partial"));
        let mut framer = ResponseFramer::new();

        let result = framer
            .read_response(&mut transport, Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(DmmError::ConnectionClosed)));
    }
}
