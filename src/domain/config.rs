use crate::domain::error::{DmmError, DmmResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DmmConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// Instrument addressing
    #[serde(default)]
    pub instrument: InstrumentConfig,
    /// Measurement settings sent to the instrument
    #[serde(default)]
    pub settings: Settings,
    /// Protocol timing
    #[serde(default)]
    pub timing: TimingConfig,
    /// Polling run orchestration
    #[serde(default)]
    pub runs: RunConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Instrument addressing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// `host:port` of the instrument's raw socket interface
    #[serde(default = "default_address")]
    pub address: String,
}

/// Measurement settings.
///
/// Supplied before a session is created and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// DC-voltage measurement range
    #[serde(default = "default_voltage_range")]
    pub voltage_range: i32,
    /// Integration time in power-line cycles
    #[serde(default = "default_power_line_cycles")]
    pub power_line_cycles: f64,
    /// Averaging filter depth; not sent, but feeds the read timeout
    #[serde(default = "default_avg_filter_size")]
    pub avg_filter_size: u32,
}

/// Protocol timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Silence window of the flush handshake in milliseconds
    #[serde(default = "default_silence_window")]
    pub silence_window_ms: u64,
    /// Fixed poll read timeout; derived from the settings when unset
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,
    /// Margin added to the derived read timeout in milliseconds
    #[serde(default = "default_read_margin")]
    pub read_margin_ms: u64,
    /// Mains frequency used to convert power-line cycles to time
    #[serde(default = "default_line_frequency")]
    pub line_frequency_hz: f64,
}

/// Polling run orchestration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of sessions opened one after another
    #[serde(default = "default_runs")]
    pub runs: u32,
    /// How long each session polls before it is closed
    #[serde(default = "default_run_duration")]
    pub run_duration_ms: u64,
    /// Pause between sessions
    #[serde(default = "default_pause")]
    pub pause_ms: u64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_address() -> String {
    "127.0.0.1:5025".to_string()
}

fn default_voltage_range() -> i32 {
    10
}

fn default_power_line_cycles() -> f64 {
    1.0
}

fn default_avg_filter_size() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    3000
}

fn default_silence_window() -> u64 {
    500
}

fn default_read_margin() -> u64 {
    1000
}

fn default_line_frequency() -> f64 {
    50.0
}

fn default_runs() -> u32 {
    4
}

fn default_run_duration() -> u64 {
    1000
}

fn default_pause() -> u64 {
    10_000
}

/// Maximum depth of the instrument's averaging filter
pub const MAX_AVG_FILTER_SIZE: u32 = 100;

/// Integration time range the instrument accepts, in power-line cycles
pub const MIN_POWER_LINE_CYCLES: f64 = 0.0005;
pub const MAX_POWER_LINE_CYCLES: f64 = 15.0;

/// Ceiling for the poll read timeout, derived or configured
pub const MAX_READ_TIMEOUT: Duration = Duration::from_secs(3600);

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            voltage_range: default_voltage_range(),
            power_line_cycles: default_power_line_cycles(),
            avg_filter_size: default_avg_filter_size(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            silence_window_ms: default_silence_window(),
            read_timeout_ms: None,
            read_margin_ms: default_read_margin(),
            line_frequency_hz: default_line_frequency(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            runs: default_runs(),
            run_duration_ms: default_run_duration(),
            pause_ms: default_pause(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> DmmResult<()> {
        if !(MIN_POWER_LINE_CYCLES..=MAX_POWER_LINE_CYCLES).contains(&self.power_line_cycles) {
            return Err(DmmError::Config {
                message: format!(
                    "power_line_cycles must be between {} and {}, got {}",
                    MIN_POWER_LINE_CYCLES, MAX_POWER_LINE_CYCLES, self.power_line_cycles
                ),
            });
        }
        if self.avg_filter_size == 0 || self.avg_filter_size > MAX_AVG_FILTER_SIZE {
            return Err(DmmError::Config {
                message: format!(
                    "avg_filter_size must be between 1 and {}, got {}",
                    MAX_AVG_FILTER_SIZE, self.avg_filter_size
                ),
            });
        }
        Ok(())
    }
}

impl TimingConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn silence_window(&self) -> Duration {
        Duration::from_millis(self.silence_window_ms)
    }

    /// Poll read timeout for the given settings.
    ///
    /// An explicit `read_timeout_ms` wins. Otherwise one reading takes
    /// `power_line_cycles / line_frequency_hz` per conversion, doubled for the
    /// auto-zero reference, times the averaging depth, plus the margin.
    /// The result never exceeds [`MAX_READ_TIMEOUT`].
    pub fn read_timeout(&self, settings: &Settings) -> Duration {
        if let Some(ms) = self.read_timeout_ms {
            return Duration::from_millis(ms).min(MAX_READ_TIMEOUT);
        }
        let conversion = settings.power_line_cycles / self.line_frequency_hz;
        let reading = 2.0 * conversion * f64::from(settings.avg_filter_size.max(1));
        Duration::try_from_secs_f64(reading.max(0.0))
            .ok()
            .and_then(|reading| Duration::from_millis(self.read_margin_ms).checked_add(reading))
            .map_or(MAX_READ_TIMEOUT, |timeout| timeout.min(MAX_READ_TIMEOUT))
    }

    pub fn validate(&self) -> DmmResult<()> {
        if self.silence_window_ms == 0 {
            return Err(DmmError::Config {
                message: "silence_window_ms must be greater than zero".to_string(),
            });
        }
        if !self.line_frequency_hz.is_finite() || self.line_frequency_hz <= 0.0 {
            return Err(DmmError::Config {
                message: format!(
                    "line_frequency_hz must be a positive number, got {}",
                    self.line_frequency_hz
                ),
            });
        }
        if self.read_timeout_ms == Some(0) {
            return Err(DmmError::Config {
                message: "read_timeout_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl RunConfig {
    pub fn run_duration(&self) -> Duration {
        Duration::from_millis(self.run_duration_ms)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

impl DmmConfig {
    /// Check every section before a session is attempted
    pub fn validate(&self) -> DmmResult<()> {
        let address = self.instrument.address.trim();
        match address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => {
                return Err(DmmError::Config {
                    message: format!("instrument address must be host:port, got '{}'", address),
                })
            }
        }
        self.settings.validate()?;
        self.timing.validate()
    }
}
