use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command line arguments for the DMM6500 client
#[derive(Parser, Debug)]
#[command(
    name = "dmm6500",
    version = env!("CARGO_PKG_VERSION"),
    about = "SCPI client that configures a bench multimeter and polls it for readings",
    long_about = "Connects to a bench multimeter over its raw SCPI socket, configures DC-voltage measurement, flushes stale output and polls readings until the session is closed."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress log output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open sessions and poll readings
    Poll(PollArgs),
    /// Print the configuration sequence without connecting
    Commands(SettingsArgs),
    /// Run a local instrument simulator
    Simulate(SimulateArgs),
    /// Configuration management commands
    Config(ConfigArgs),
    /// Display version information
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Table output
    Table,
}

/// Measurement setting overrides
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct SettingsArgs {
    /// DC-voltage range
    #[arg(long)]
    pub range: Option<i32>,

    /// Integration time in power-line cycles
    #[arg(long)]
    pub nplc: Option<f64>,

    /// Averaging filter depth (1-100)
    #[arg(long)]
    pub avg: Option<u32>,
}

/// Polling arguments; unset values come from the configuration
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct PollArgs {
    /// Instrument address (host:port)
    #[arg(short, long)]
    pub address: Option<String>,

    /// Number of sessions to open one after another
    #[arg(short, long)]
    pub runs: Option<u32>,

    /// How long each session polls, in milliseconds
    #[arg(long)]
    pub duration_ms: Option<u64>,

    /// Pause between sessions, in milliseconds
    #[arg(long)]
    pub pause_ms: Option<u64>,

    /// Flush silence window, in milliseconds
    #[arg(long)]
    pub silence_ms: Option<u64>,

    /// Fixed poll read timeout, in milliseconds
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

/// Simulator arguments
#[derive(ClapArgs, Debug)]
pub struct SimulateArgs {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:5025")]
    pub bind: String,

    /// Delay before each reading is answered, in milliseconds
    #[arg(long, default_value = "20")]
    pub delay_ms: u64,

    /// Line delivered unsolicited to the first client
    #[arg(long)]
    pub stale: Option<String>,
}

/// Configuration management arguments
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Validate configuration
    Validate {
        /// Configuration file path
        file: Option<String>,
    },
    /// Create default configuration
    Init {
        /// Project directory to create `.dmm6500/config.toml` in
        #[arg(short, long)]
        path: Option<String>,
        /// Write the global configuration instead
        #[arg(short, long)]
        global: bool,
    },
}
