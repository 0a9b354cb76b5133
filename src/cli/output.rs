use crate::cli::args::OutputFormat;
use crate::cli::runner::RunSummary;
use crate::core::communication::Command;
use crate::domain::config::DmmConfig;
use std::io;
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_runs(&self, runs: &[RunSummary]) -> Result<(), OutputError>;
    fn write_commands(&self, commands: &[Command]) -> Result<(), OutputError>;
    fn write_config(&self, config: &DmmConfig) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("TOML serialization error: {0}")]
    TomlError(#[from] toml::ser::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::DmmError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_runs(&self, runs: &[RunSummary]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                for run in runs {
                    println!("Run #{} ({})", run.run, run.address);
                    println!("  Readings: {}", run.readings);
                    println!("  Flushed: {} bytes", run.flushed_bytes);
                    println!("  Stopped: {}", run.stop_reason);
                    if let Some(line) = &run.last_reading {
                        println!("  Last reading: {}", line);
                    }
                    if let Some(error) = &run.error {
                        println!("  Error: {}", error);
                    }
                    println!();
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(runs)?);
            }
            OutputFormat::Table => {
                if !runs.is_empty() {
                    let rows: Vec<RunTableRow> = runs.iter().map(RunTableRow::from).collect();
                    println!("{}", Table::new(rows));
                }
            }
        }
        Ok(())
    }

    fn write_commands(&self, commands: &[Command]) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let lines: Vec<&str> = commands.iter().map(Command::as_str).collect();
                println!("{}", serde_json::to_string_pretty(&lines)?);
            }
            OutputFormat::Table => {
                let rows: Vec<CommandTableRow> = commands
                    .iter()
                    .enumerate()
                    .map(|(i, c)| CommandTableRow {
                        step: i + 1,
                        command: c.to_string(),
                    })
                    .collect();
                println!("{}", Table::new(rows));
            }
            OutputFormat::Text => {
                for command in commands {
                    println!("{}", command);
                }
            }
        }
        Ok(())
    }

    fn write_config(&self, config: &DmmConfig) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(config)?);
            }
            _ => {
                print!("{}", toml::to_string_pretty(config)?);
            }
        }
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "message": message,
                    "level": "info"
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                println!("{}", message);
            }
        }
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "error": error,
                    "level": "error"
                });
                eprintln!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                eprintln!("Error: {}", error);
            }
        }
        Ok(())
    }
}

/// Table row for run summaries
#[derive(Tabled)]
struct RunTableRow {
    run: u32,
    readings: u64,
    flushed: usize,
    stopped: String,
    last: String,
}

impl From<&RunSummary> for RunTableRow {
    fn from(run: &RunSummary) -> Self {
        Self {
            run: run.run,
            readings: run.readings,
            flushed: run.flushed_bytes,
            stopped: match &run.error {
                Some(error) => error.clone(),
                None => run.stop_reason.clone(),
            },
            last: run.last_reading.clone().unwrap_or_default(),
        }
    }
}

/// Table row for the command sequence
#[derive(Tabled)]
struct CommandTableRow {
    step: usize,
    command: String,
}
