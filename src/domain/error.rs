use thiserror::Error;

/// Unified error type for the instrument client
#[derive(Error, Debug)]
pub enum DmmError {
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("Failed to connect to {address}: {message}")]
    Connect { address: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Communication timeout")]
    Timeout,

    #[error("Connection closed by instrument")]
    ConnectionClosed,

    #[error("Device not connected")]
    NotConnected,

    #[error("Failed to send command '{command}': {source}")]
    CommandWrite {
        command: String,
        #[source]
        source: Box<DmmError>,
    },

    #[error("Flush handshake failed: {0}")]
    Flush(#[source] Box<DmmError>),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl DmmError {
    /// True when the error is a deadline expiry, including wrapped ones.
    pub fn is_timeout(&self) -> bool {
        match self {
            DmmError::Timeout => true,
            DmmError::Network(e) => e.kind() == std::io::ErrorKind::TimedOut,
            DmmError::CommandWrite { source, .. } => source.is_timeout(),
            DmmError::Flush(source) => source.is_timeout(),
            _ => false,
        }
    }

    /// True when the peer or the local side has closed the connection.
    pub fn is_closed(&self) -> bool {
        match self {
            DmmError::ConnectionClosed | DmmError::NotConnected => true,
            DmmError::CommandWrite { source, .. } => source.is_closed(),
            DmmError::Flush(source) => source.is_closed(),
            _ => false,
        }
    }
}

pub type DmmResult<T> = Result<T, DmmError>;
