//! sysrelay - relay syslog messages into IRC channels
//!
//! # Usage
//!
//! ```bash
//! sysrelay configs/sysrelay.toml
//! sysrelay configs/sysrelay.toml --log-level debug
//! ```

mod serve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use sysrelay_config::{Config, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Receive syslog messages and forward them to IRC channels
#[derive(Parser, Debug)]
#[command(name = "sysrelay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config);
    let (log_level, log_format) = resolve_logging(cli.log_level.as_deref(), config.as_ref().ok());
    init_logging(&log_level, log_format)?;

    serve::run(&cli.config, config?).await
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

/// Resolve log level (CLI flag > config file > "info") and output format
fn resolve_logging(cli_level: Option<&str>, config: Option<&Config>) -> (String, LogFormat) {
    let format = config.map(|c| c.log.format).unwrap_or_default();

    if let Some(level) = cli_level {
        return (level.to_string(), format);
    }
    if let Some(config) = config {
        return (config.log.level.as_str().to_string(), format);
    }
    ("info".to_string(), format)
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    match format {
        LogFormat::Console => tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .init(),
    }

    Ok(())
}
