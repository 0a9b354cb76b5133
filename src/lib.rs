//! DMM6500 client library
//!
//! Configures a bench multimeter over its raw SCPI socket, drains stale
//! output left by earlier connections and polls readings on a background
//! task until the session is closed.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use core::communication::{CloseHandle, Command, ResponseFramer, Transport};
pub use core::session::{
    ChannelSink, Observation, ObservationSink, Reading, Session, SessionOptions, SessionStatus,
    StopReason, TracingSink,
};
pub use domain::config::{DmmConfig, Settings};
pub use domain::error::{DmmError, DmmResult};
pub use infrastructure::tcp::{InstrumentSimulator, TcpTransport};
