use crate::domain::{
    config::Settings,
    error::{DmmError, DmmResult},
};
use std::fmt;

/// Buffer the read request pulls readings from
pub const DEFAULT_BUFFER: &str = "defbuffer1";

/// A single SCPI command line, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command(String);

impl Command {
    /// Create a command, rejecting text that would break line framing
    pub fn new(text: impl Into<String>) -> DmmResult<Self> {
        let text = text.into();
        if text.contains(['\n', '\r']) {
            return Err(DmmError::InvalidInput(format!(
                "command contains a line terminator: {:?}",
                text
            )));
        }
        if !text.is_ascii() {
            return Err(DmmError::InvalidInput(format!(
                "command is not ASCII: {:?}",
                text
            )));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wire form: the command followed by exactly one `\n`
    pub fn to_line(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.0.len() + 1);
        bytes.extend_from_slice(self.0.as_bytes());
        bytes.push(b'\n');
        bytes
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Commands that bring the instrument into a pollable DC-voltage state.
///
/// Order matters and is sent exactly as returned.
pub fn configuration_sequence(settings: &Settings) -> Vec<Command> {
    vec![
        // Defaults, clears reading buffers
        Command("*RST".to_string()),
        // Event log
        Command("SYSTem:CLEar".to_string()),
        // Event registers and queues
        Command("*CLS".to_string()),
        Command("SENS:FUNC \"VOLT:DC\"".to_string()),
        Command(format!("SENS:VOLT:RANG {}", settings.voltage_range)),
        Command("SENS:VOLT:AZER ON".to_string()),
        // 10 MOhm input is required for the HV probe
        Command("SENS:VOLT:INP MOHM10".to_string()),
        Command(format!("SENS:VOLT:NPLC {:.6}", settings.power_line_cycles)),
    ]
}

/// The recurring request for one reading plus its timestamp
pub fn read_request() -> Command {
    Command(format!("READ? \"{}\", READ, TSTamp", DEFAULT_BUFFER))
}
