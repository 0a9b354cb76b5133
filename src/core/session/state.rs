use crate::domain::error::DmmError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a polling loop ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The session owner closed the connection
    Closed,
    /// No complete response arrived within the read timeout
    Timeout,
    /// The instrument closed the connection
    Disconnected,
    /// Any other read failure
    Error(String),
}

impl StopReason {
    /// Classify the read failure that ended the loop
    pub fn from_read_error(error: &DmmError) -> Self {
        match error {
            DmmError::NotConnected => StopReason::Closed,
            DmmError::ConnectionClosed => StopReason::Disconnected,
            e if e.is_timeout() => StopReason::Timeout,
            e => StopReason::Error(e.to_string()),
        }
    }

    /// True unless the loop ended because its owner asked it to
    pub fn is_failure(&self) -> bool {
        !matches!(self, StopReason::Closed)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Closed => write!(f, "closed"),
            StopReason::Timeout => write!(f, "read timeout"),
            StopReason::Disconnected => write!(f, "disconnected by instrument"),
            StopReason::Error(err) => write!(f, "error: {}", err),
        }
    }
}

/// Observable state of a session's polling loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Polling { readings: u64 },
    Stopped { readings: u64, reason: StopReason },
}

impl SessionStatus {
    pub fn readings(&self) -> u64 {
        match self {
            SessionStatus::Polling { readings } | SessionStatus::Stopped { readings, .. } => *readings,
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, SessionStatus::Stopped { .. })
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        match self {
            SessionStatus::Stopped { reason, .. } => Some(reason),
            SessionStatus::Polling { .. } => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Polling { readings } => write!(f, "Polling ({} readings)", readings),
            SessionStatus::Stopped { readings, reason } => {
                write!(f, "Stopped after {} readings: {}", readings, reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_reason_classification() {
        assert_eq!(StopReason::from_read_error(&DmmError::NotConnected), StopReason::Closed);
        assert_eq!(
            StopReason::from_read_error(&DmmError::ConnectionClosed),
            StopReason::Disconnected
        );
        assert_eq!(StopReason::from_read_error(&DmmError::Timeout), StopReason::Timeout);
        assert!(matches!(
            StopReason::from_read_error(&DmmError::InvalidInput("x".to_string())),
            StopReason::Error(_)
        ));
        assert!(!StopReason::Closed.is_failure());
        assert!(StopReason::Timeout.is_failure());
    }

    #[test]
    fn test_status_accessors() {
        let polling = SessionStatus::Polling { readings: 3 };
        assert_eq!(polling.readings(), 3);
        assert!(!polling.is_stopped());
        assert!(polling.stop_reason().is_none());

        let stopped = SessionStatus::Stopped {
            readings: 7,
            reason: StopReason::Timeout,
        };
        assert_eq!(stopped.readings(), 7);
        assert_eq!(stopped.stop_reason(), Some(&StopReason::Timeout));
        assert_eq!(stopped.to_string(), "Stopped after 7 readings: read timeout");
    }
}
