use crate::core::communication::{read_request, ResponseFramer, Transport};
use crate::core::session::sink::{Observation, ObservationSink, Reading};
use crate::core::session::state::{SessionStatus, StopReason};
use crate::domain::error::DmmError;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Upper bound on the pause before a failed request write is retried
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Request/response loop that runs for the lifetime of a connection.
///
/// Each turn writes one read request and frames one line. A failed write is
/// reported and retried on the next turn without reading; any read failure
/// or a local close ends the loop. The loop never reconnects.
pub struct PollingLoop<T> {
    transport: T,
    framer: ResponseFramer,
    read_timeout: Duration,
    sink: Arc<dyn ObservationSink>,
    status: watch::Sender<SessionStatus>,
}

impl<T> PollingLoop<T>
where
    T: Transport,
{
    pub fn new(
        transport: T,
        read_timeout: Duration,
        sink: Arc<dyn ObservationSink>,
        status: watch::Sender<SessionStatus>,
    ) -> Self {
        Self {
            transport,
            framer: ResponseFramer::new(),
            read_timeout,
            sink,
            status,
        }
    }

    /// Poll until a read fails; returns the terminal status.
    pub async fn run(mut self) -> SessionStatus {
        let request = read_request().to_line();
        let mut sequence = 0u64;

        let reason = loop {
            match self.transport.send(&request).await {
                Ok(()) => {}
                Err(DmmError::NotConnected) => {
                    debug!("Connection closed before request {}", sequence + 1);
                    break StopReason::Closed;
                }
                Err(e) => {
                    warn!("Read request write failed after reading {}: {}", sequence, e);
                    self.sink.observe(Observation::WriteFailed {
                        after_sequence: sequence,
                        message: e.to_string(),
                    });
                    // Nothing is outstanding, so skip the read and retry
                    let close = self.transport.close_handle();
                    tokio::select! {
                        _ = close.closed() => break StopReason::Closed,
                        _ = tokio::time::sleep(self.read_timeout.min(WRITE_RETRY_DELAY)) => continue,
                    }
                }
            }

            match self
                .framer
                .read_response(&mut self.transport, self.read_timeout)
                .await
            {
                Ok(line) => {
                    sequence += 1;
                    self.status.send_replace(SessionStatus::Polling { readings: sequence });
                    self.sink.observe(Observation::Reading(Reading {
                        sequence,
                        line,
                        received_at: SystemTime::now(),
                    }));
                }
                Err(e) => {
                    debug!("Read failed after {} readings: {}", sequence, e);
                    break StopReason::from_read_error(&e);
                }
            }
        };

        if let Err(e) = self.transport.shutdown().await {
            warn!("Failed to release connection: {}", e);
        }

        let status = SessionStatus::Stopped {
            readings: sequence,
            reason: reason.clone(),
        };
        self.status.send_replace(status.clone());
        self.sink.observe(Observation::Stopped {
            readings: sequence,
            reason,
        });
        status
    }
}
