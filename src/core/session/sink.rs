use crate::core::session::state::StopReason;
use serde::Serialize;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// One framed response line and its position in the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// Starts at 1, increments by one per framed line
    pub sequence: u64,
    pub line: String,
    pub received_at: SystemTime,
}

/// Everything the polling loop reports
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Reading(Reading),
    /// A read request could not be written; `after_sequence` is the last
    /// reading delivered before the failure
    WriteFailed { after_sequence: u64, message: String },
    Stopped { readings: u64, reason: StopReason },
}

/// Consumer of polling loop output, injected into the session.
pub trait ObservationSink: Send + Sync {
    fn observe(&self, observation: Observation);
}

/// Renders observations through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ObservationSink for TracingSink {
    fn observe(&self, observation: Observation) {
        match observation {
            Observation::Reading(reading) => info!("{} {}", reading.sequence, reading.line),
            Observation::WriteFailed { message, .. } => warn!("error while writing {}", message),
            Observation::Stopped { readings, reason } if reason.is_failure() => {
                error!("Polling stopped after {} readings: {}", readings, reason)
            }
            Observation::Stopped { readings, reason } => {
                info!("Polling stopped after {} readings: {}", readings, reason)
            }
        }
    }
}

/// Forwards observations over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Observation>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Observation>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ObservationSink for ChannelSink {
    fn observe(&self, observation: Observation) {
        // A dropped receiver only means nobody is listening any more
        let _ = self.sender.send(observation);
    }
}
