use crate::core::communication::transport::Transport;
use crate::domain::error::{DmmError, DmmResult};
use std::time::Duration;
use tracing::debug;

const DISCARD_BUFFER_SIZE: usize = 4096;

/// Drain the connection until `silence_window` passes with no data.
///
/// The instrument may deliver the answer to a previous session's last read
/// request at the start of a new connection; everything received here is
/// discarded. A read timeout is the success condition. Returns the number
/// of bytes thrown away.
pub async fn flush_handshake<T>(transport: &mut T, silence_window: Duration) -> DmmResult<usize>
where
    T: Transport + ?Sized,
{
    let mut discard = [0u8; DISCARD_BUFFER_SIZE];
    let mut discarded = 0usize;

    loop {
        match transport.receive(&mut discard, silence_window).await {
            Err(DmmError::Timeout) => {
                if discarded > 0 {
                    debug!("Flush discarded {} stale bytes", discarded);
                } else {
                    debug!("Flush observed silence, nothing stale");
                }
                return Ok(discarded);
            }
            Ok(0) => return Err(DmmError::ConnectionClosed),
            Ok(n) => discarded += n,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::tcp::client::StreamTransport;
    use std::time::Instant;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_flush_waits_for_final_silence() {
        let silence = Duration::from_millis(100);
        let gap = Duration::from_millis(30);
        let mock = Builder::new()
            .read(b"+9.9E+37,stale\n")
            .wait(gap)
            .read(b"burst two")
            .wait(gap)
            .read(b"burst three\n")
            .wait(silence * 5)
            .build();
        let mut transport = StreamTransport::new(mock, "mock".to_string());

        let started = Instant::now();
        let discarded = flush_handshake(&mut transport, silence).await.unwrap();

        assert_eq!(
            discarded,
            "+9.9E+37,stale\n".len() + "burst two".len() + "burst three\n".len()
        );
        assert!(started.elapsed() >= gap * 2 + silence);
    }

    #[tokio::test]
    async fn test_flush_on_quiet_connection() {
        let mock = Builder::new().wait(Duration::from_millis(500)).build();
        let mut transport = StreamTransport::new(mock, "mock".to_string());

        let discarded = flush_handshake(&mut transport, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(discarded, 0);
    }

    #[tokio::test]
    async fn test_flush_fails_on_closed_stream() {
        let mock = Builder::new().read(b"leftover").build();
        let mut transport = StreamTransport::new(mock, "mock".to_string());

        let result = flush_handshake(&mut transport, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(DmmError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_flush_propagates_read_errors() {
        let mock = Builder::new()
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();
        let mut transport = StreamTransport::new(mock, "mock".to_string());

        let result = flush_handshake(&mut transport, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(DmmError::Network(_))));
    }
}
