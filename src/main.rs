//! herakles-host-telemetry - version 0.1.0
//!
//! Diagnostic front end for the telemetry library with tracing logging.
//! Resolves configuration, selects the platform backend and dispatches
//! subcommands.

mod cli;
mod commands;
mod config;

use clap::Parser;
use herakles_host_telemetry::platform;
use tracing::info;
use tracing::level_filters::LevelFilter;

use cli::{Args, Commands, ConfigFormat, LogLevel};
use commands::{command_check, command_config, command_snapshot};
use config::{resolve_config, validate_effective_config, Config, DEFAULT_LOG_LEVEL};

/// Initializes tracing logging subsystem with configured log level.
/// Logs go to stderr so snapshots on stdout stay machine-readable.
fn setup_logging(config: &Config) {
    let level = config
        .log_level
        .as_deref()
        .and_then(LogLevel::from_name)
        .unwrap_or(LogLevel::Info);
    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    info!(
        "Logging initialized with level: {}",
        config.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    );
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_validated_config(&args)?;
    setup_logging(&config);

    let backend = platform::open(
        config.root.as_deref(),
        config.allow_commands.unwrap_or(true),
    );
    info!("Platform backend: {}", backend.name());

    match args.command {
        Some(Commands::Check { verbose }) => command_check(verbose, &config, backend.as_ref()),
        Some(Commands::Config { format, defaults }) => command_config(&config, format, defaults),
        Some(Commands::Snapshot {
            format,
            output,
            parent,
            services,
        }) => command_snapshot(backend.as_ref(), &config, format, output, parent, services),
        None => command_snapshot(backend.as_ref(), &config, ConfigFormat::Yaml, None, None, false),
    }
}
