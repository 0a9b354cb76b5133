// Session module - Instrument session lifecycle
pub mod poller;
pub mod session;
pub mod sink;
pub mod state;

pub use poller::PollingLoop;
pub use session::{initialize, Session, SessionOptions};
pub use sink::{ChannelSink, Observation, ObservationSink, Reading, TracingSink};
pub use state::{SessionStatus, StopReason};
