use crate::cli::args::{Args, Command, ConfigCommand, PollArgs, SettingsArgs, SimulateArgs};
use crate::cli::output::{ConsoleWriter, OutputWriter};
use crate::cli::runner::{run_sessions, RunPlan};
use crate::core::communication::{configuration_sequence, read_request};
use crate::core::session::TracingSink;
use crate::domain::config::DmmConfig;
use crate::domain::error::DmmError;
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::tcp::InstrumentSimulator;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Execute CLI command
pub async fn execute_command(args: Args) -> Result<(), DmmError> {
    let writer = ConsoleWriter::new(args.output);

    // Load configuration using ConfigManager
    let config_manager = ConfigManager::new()?;
    let config = if let Some(config_path) = &args.config {
        config_manager.load_config_from_path(config_path.as_ref())?
    } else {
        config_manager.load_config()?
    };

    // Initialize logging
    if !args.quiet {
        init_logging(&config.global.log_level, args.verbose)?;
    }

    match args.command {
        Command::Poll(poll_args) => execute_poll(poll_args, &writer, config).await,
        Command::Commands(settings_args) => execute_commands(settings_args, &writer, config),
        Command::Simulate(simulate_args) => execute_simulate(simulate_args, &writer).await,
        Command::Config(config_args) => {
            execute_config_command(config_args.command, &writer, &config, &config_manager)
        }
        Command::Version => {
            writer.write_message(&format!("dmm6500 {}", env!("CARGO_PKG_VERSION")))?;
            Ok(())
        }
    }
}

/// Apply measurement overrides on top of the loaded configuration
pub fn apply_settings_args(config: &mut DmmConfig, args: &SettingsArgs) {
    if let Some(range) = args.range {
        config.settings.voltage_range = range;
    }
    if let Some(nplc) = args.nplc {
        config.settings.power_line_cycles = nplc;
    }
    if let Some(avg) = args.avg {
        config.settings.avg_filter_size = avg;
    }
}

/// Apply polling overrides on top of the loaded configuration
pub fn apply_poll_args(config: &mut DmmConfig, args: &PollArgs) {
    if let Some(address) = &args.address {
        config.instrument.address = address.clone();
    }
    if let Some(runs) = args.runs {
        config.runs.runs = runs;
    }
    if let Some(duration) = args.duration_ms {
        config.runs.run_duration_ms = duration;
    }
    if let Some(pause) = args.pause_ms {
        config.runs.pause_ms = pause;
    }
    if let Some(silence) = args.silence_ms {
        config.timing.silence_window_ms = silence;
    }
    if args.read_timeout_ms.is_some() {
        config.timing.read_timeout_ms = args.read_timeout_ms;
    }
    apply_settings_args(config, &args.settings);
}

async fn execute_poll(
    args: PollArgs,
    writer: &ConsoleWriter,
    mut config: DmmConfig,
) -> Result<(), DmmError> {
    apply_poll_args(&mut config, &args);
    config.validate()?;

    let plan = RunPlan::from_config(&config);
    let summaries = run_sessions(&plan, Arc::new(TracingSink)).await;
    writer.write_runs(&summaries)?;

    if summaries.iter().all(|s| s.error.is_some()) {
        return Err(DmmError::Session {
            message: format!("No session could be established with {}", plan.address),
        });
    }
    Ok(())
}

fn execute_commands(
    args: SettingsArgs,
    writer: &ConsoleWriter,
    mut config: DmmConfig,
) -> Result<(), DmmError> {
    apply_settings_args(&mut config, &args);
    config.settings.validate()?;

    let mut commands = configuration_sequence(&config.settings);
    commands.push(read_request());
    writer.write_commands(&commands)?;
    Ok(())
}

async fn execute_simulate(args: SimulateArgs, writer: &ConsoleWriter) -> Result<(), DmmError> {
    let mut simulator =
        InstrumentSimulator::new(&args.bind, Duration::from_millis(args.delay_ms)).await?;
    if let Some(stale) = &args.stale {
        simulator.preload_stale(stale).await;
    }
    simulator.start().await?;
    writer.write_message(&format!(
        "Simulator listening on {} (Ctrl-C to stop)",
        simulator.bind_addr()
    ))?;

    tokio::signal::ctrl_c().await?;

    simulator.stop().await?;
    writer.write_message(&format!(
        "Simulator stopped after serving {} readings",
        simulator.readings_served().await
    ))?;
    Ok(())
}

fn execute_config_command(
    command: ConfigCommand,
    writer: &ConsoleWriter,
    config: &DmmConfig,
    config_manager: &ConfigManager,
) -> Result<(), DmmError> {
    match command {
        ConfigCommand::Show => {
            writer.write_config(config)?;
            Ok(())
        }
        ConfigCommand::Validate { file } => {
            let candidate = match &file {
                Some(path) => config_manager.load_config_from_path(path.as_ref())?,
                None => config.clone(),
            };
            candidate.validate()?;
            writer.write_message("Configuration is valid")?;
            Ok(())
        }
        ConfigCommand::Init { path, global } => {
            let written = if global {
                config_manager.init_global_config()?
            } else {
                let dir = match path {
                    Some(path) => PathBuf::from(path),
                    None => std::env::current_dir()?,
                };
                config_manager.init_project_config(&dir)?
            };
            writer.write_message(&format!("Configuration written to {}", written.display()))?;
            Ok(())
        }
    }
}
