// Logging module - Logging infrastructure
use crate::domain::error::{DmmError, DmmResult};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Resolve the filter directive from the configured level and `-v`.
///
/// Unknown level names fall back to `info`.
pub fn filter_directive(log_level: &str, verbose: bool) -> String {
    let level = if verbose {
        "debug"
    } else {
        match log_level.to_ascii_lowercase().as_str() {
            "error" => "error",
            "warn" => "warn",
            "debug" => "debug",
            "trace" => "trace",
            _ => "info",
        }
    };
    format!("dmm6500={},warn", level)
}

/// Initialize logging system.
///
/// `RUST_LOG` takes precedence over the configured level. Logs go to
/// stderr so stdout stays free for command output.
pub fn init_logging(log_level: &str, verbose: bool) -> DmmResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(log_level, verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_level(true)
                .with_thread_ids(false),
        )
        .try_init()
        .map_err(|e| DmmError::Config {
            message: format!("Failed to initialize logging: {}", e),
        })?;

    tracing::debug!("Logging initialized");
    Ok(())
}
