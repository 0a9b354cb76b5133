use crate::core::communication::{configuration_sequence, flush_handshake, CloseHandle, Transport};
use crate::core::session::poller::PollingLoop;
use crate::core::session::sink::ObservationSink;
use crate::core::session::state::SessionStatus;
use crate::domain::config::{Settings, TimingConfig};
use crate::domain::error::{DmmError, DmmResult};
use crate::infrastructure::tcp::client::TcpTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Timing applied to one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub connect_timeout: Duration,
    /// Quiet period that ends the flush handshake
    pub silence_window: Duration,
    /// Bound on each poll response
    pub read_timeout: Duration,
}

impl SessionOptions {
    pub fn from_config(timing: &TimingConfig, settings: &Settings) -> Self {
        Self {
            connect_timeout: timing.connect_timeout(),
            silence_window: timing.silence_window(),
            read_timeout: timing.read_timeout(settings),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&TimingConfig::default(), &Settings::default())
    }
}

/// A configured instrument connection with its polling task.
///
/// Dropping a session closes the connection; [`close`](Session::close)
/// additionally waits for the polling task and returns its final status.
pub struct Session {
    close: CloseHandle,
    status: watch::Receiver<SessionStatus>,
    task: Option<JoinHandle<SessionStatus>>,
    discarded_bytes: usize,
}

impl Session {
    /// Connect over TCP, configure, flush, then start polling
    pub async fn connect(
        address: &str,
        settings: Settings,
        options: SessionOptions,
        sink: Arc<dyn ObservationSink>,
    ) -> DmmResult<Self> {
        settings.validate()?;
        let transport = TcpTransport::connect(address, options.connect_timeout).await?;
        Self::start(transport, settings, options, sink).await
    }

    /// Configure and flush an already open transport, then start polling.
    ///
    /// On failure the transport is shut down and no task is started.
    pub async fn start<T>(
        mut transport: T,
        settings: Settings,
        options: SessionOptions,
        sink: Arc<dyn ObservationSink>,
    ) -> DmmResult<Self>
    where
        T: Transport + 'static,
    {
        let discarded_bytes = match initialize(&mut transport, &settings, options.silence_window).await {
            Ok(discarded) => discarded,
            Err(e) => {
                warn!("Session initialization failed: {}", e);
                if let Err(close_err) = transport.shutdown().await {
                    warn!("Failed to close connection after error: {}", close_err);
                }
                return Err(e);
            }
        };

        let close = transport.close_handle();
        let (status_sender, status) = watch::channel(SessionStatus::Polling { readings: 0 });
        let poller = PollingLoop::new(transport, options.read_timeout, sink, status_sender);
        let task = tokio::spawn(poller.run());

        info!(
            "Session started (read timeout {} ms, {} stale bytes flushed)",
            options.read_timeout.as_millis(),
            discarded_bytes
        );

        Ok(Self {
            close,
            status,
            task: Some(task),
            discarded_bytes,
        })
    }

    /// Current polling state
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Wait until the polling loop has stopped on its own or been closed
    pub async fn stopped(&mut self) -> SessionStatus {
        if let Ok(status) = self.status.wait_for(|status| status.is_stopped()).await {
            return status.clone();
        }
        // Sender gone: the task already published its last value
        self.status.borrow().clone()
    }

    /// Bytes discarded by the flush handshake
    pub fn discarded_bytes(&self) -> usize {
        self.discarded_bytes
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    /// Close the connection and join the polling task
    pub async fn close(mut self) -> DmmResult<SessionStatus> {
        self.close.close();
        match self.task.take() {
            Some(task) => task.await.map_err(|e| DmmError::Session {
                message: format!("Polling task failed: {}", e),
            }),
            None => Ok(self.status()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.close.close();
        }
    }
}

/// Send the configuration sequence and drain stale output.
///
/// Stops at the first failed write. Returns the number of flushed bytes.
pub async fn initialize<T>(transport: &mut T, settings: &Settings, silence_window: Duration) -> DmmResult<usize>
where
    T: Transport + ?Sized,
{
    for command in configuration_sequence(settings) {
        debug!("{}", command);
        transport
            .send(&command.to_line())
            .await
            .map_err(|e| DmmError::CommandWrite {
                command: command.to_string(),
                source: Box::new(e),
            })?;
    }

    flush_handshake(transport, silence_window)
        .await
        .map_err(|e| DmmError::Flush(Box::new(e)))
}
