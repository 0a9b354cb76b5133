use crate::domain::error::{DmmError, DmmResult};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Command prefix the simulator answers with a reading
const READ_PREFIX: &str = "READ?";

#[derive(Debug, Default)]
struct SimulatorState {
    /// Command lines received, one list per accepted connection
    connections: Vec<Vec<String>>,
    /// Reading owed to a client that left before it was delivered
    pending_stale: Option<String>,
    readings_served: u64,
}

/// Local stand-in for the multimeter's raw socket interface.
///
/// Serves one client at a time, records every command line and answers
/// each `READ?` after `measurement_delay`. A reading still outstanding when
/// the client disconnects is written as the first bytes of the next
/// connection, the same way the real instrument misbehaves.
pub struct InstrumentSimulator {
    listener: Option<TcpListener>,
    bind_addr: SocketAddr,
    measurement_delay: Duration,
    state: Arc<Mutex<SimulatorState>>,
    shutdown_sender: mpsc::Sender<()>,
    shutdown_receiver: Option<mpsc::Receiver<()>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl InstrumentSimulator {
    pub async fn new(bind_addr: &str, measurement_delay: Duration) -> DmmResult<Self> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| DmmError::Session {
                message: format!("Failed to bind to {}: {}", bind_addr, e),
            })?;

        let actual_addr = listener.local_addr().map_err(|e| DmmError::Session {
            message: format!("Failed to get local address: {}", e),
        })?;

        let (shutdown_sender, shutdown_receiver) = mpsc::channel(1);

        info!("Instrument simulator created on {}", actual_addr);

        Ok(Self {
            listener: Some(listener),
            bind_addr: actual_addr,
            measurement_delay,
            state: Arc::new(Mutex::new(SimulatorState::default())),
            shutdown_sender,
            shutdown_receiver: Some(shutdown_receiver),
            server_handle: None,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    /// Queue a line to be delivered unsolicited on the next connection
    pub async fn preload_stale(&self, line: &str) {
        let mut state = self.state.lock().await;
        state.pending_stale = Some(format!("{}\n", line.trim_end_matches('\n')));
    }

    pub async fn start(&mut self) -> DmmResult<()> {
        let (listener, mut shutdown_receiver) =
            match (self.listener.take(), self.shutdown_receiver.take()) {
                (Some(listener), Some(receiver)) => (listener, receiver),
                _ => {
                    return Err(DmmError::Session {
                        message: "Simulator is already running".to_string(),
                    })
                }
            };

        info!("Starting instrument simulator on {}", self.bind_addr);

        let state = Arc::clone(&self.state);
        let delay = self.measurement_delay;
        let started = Instant::now();

        let server_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, addr)) => {
                                info!("Client connected: {}", addr);
                                tokio::select! {
                                    result = Self::handle_client(stream, addr, &state, delay, started) => {
                                        if let Err(e) = result {
                                            error!("Error handling client {}: {}", addr, e);
                                        }
                                        info!("Client disconnected: {}", addr);
                                    }
                                    _ = shutdown_receiver.recv() => {
                                        info!("Received shutdown signal, stopping simulator");
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {}", e);
                            }
                        }
                    }

                    _ = shutdown_receiver.recv() => {
                        info!("Received shutdown signal, stopping simulator");
                        break;
                    }
                }
            }
        });

        self.server_handle = Some(server_handle);
        Ok(())
    }

    async fn handle_client(
        stream: TcpStream,
        addr: SocketAddr,
        state: &Arc<Mutex<SimulatorState>>,
        delay: Duration,
        started: Instant,
    ) -> DmmResult<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let (index, stale) = {
            let mut state = state.lock().await;
            state.connections.push(Vec::new());
            (state.connections.len() - 1, state.pending_stale.take())
        };

        if let Some(stale) = stale {
            debug!("Replaying stale reading to {}: {:?}", addr, stale);
            write_half.write_all(stale.as_bytes()).await?;
            write_half.flush().await?;
        }

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                debug!("Client {} disconnected gracefully", addr);
                return Ok(());
            }

            let command = line.trim_end_matches(['\n', '\r']).to_string();
            debug!("Received command from {}: {}", addr, command);

            let reading = {
                let mut state = state.lock().await;
                state.connections[index].push(command.clone());
                if !command.starts_with(READ_PREFIX) {
                    continue;
                }
                state.readings_served += 1;
                format_reading(state.readings_served, started.elapsed())
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                buffered = reader.fill_buf() => {
                    if buffered?.is_empty() {
                        debug!("Client {} left with a reading outstanding", addr);
                        state.lock().await.pending_stale = Some(reading);
                        return Ok(());
                    }
                }
            }

            write_half.write_all(reading.as_bytes()).await?;
            write_half.flush().await?;
        }
    }

    pub async fn stop(&mut self) -> DmmResult<()> {
        if let Some(handle) = self.server_handle.take() {
            info!("Stopping instrument simulator");

            if let Err(e) = self.shutdown_sender.send(()).await {
                warn!("Failed to send shutdown signal: {}", e);
            }

            if let Err(e) = handle.await {
                warn!("Simulator task completed with error: {}", e);
            }

            info!("Instrument simulator stopped");
        }

        Ok(())
    }

    /// Commands received so far, grouped per connection
    pub async fn connections(&self) -> Vec<Vec<String>> {
        self.state.lock().await.connections.clone()
    }

    pub async fn readings_served(&self) -> u64 {
        self.state.lock().await.readings_served
    }

    pub async fn has_stale_reading(&self) -> bool {
        self.state.lock().await.pending_stale.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.server_handle.is_some()
    }
}

/// Reading plus relative timestamp, in the shape `READ?` returns them
fn format_reading(sequence: u64, elapsed: Duration) -> String {
    let value = 1.0 + sequence as f64 * 1e-6;
    format!("{:+.6E},{:.6}\n", value, elapsed.as_secs_f64())
}

impl Drop for InstrumentSimulator {
    fn drop(&mut self) {
        if self.server_handle.is_some() {
            warn!("InstrumentSimulator dropped while still running");
        }
    }
}
