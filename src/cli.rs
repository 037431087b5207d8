//! CLI arguments and subcommands for herakles-host-telemetry.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use herakles_host_telemetry::process::ProcessSort;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-host-telemetry",
    about = "Host telemetry: OS identity, processor topology, processes and CPU counters",
    long_about = "Host telemetry: OS identity, processor topology, processes and CPU counters.\n\n\
                  Reads kernel pseudo-files, OS descriptor files and diagnostic commands and \
                  normalizes them into one data model. Snapshots can be written as YAML, JSON \
                  or TOML for diagnostics.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "Project: https://github.com/cansp-dev/herakles-host-telemetry - More info: https://www.herakles.now - Support: exporter@herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (overrides config file)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Read all sources below this directory instead of /
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Never run external diagnostic commands
    #[arg(long)]
    pub no_commands: bool,

    /// Count open files and probe executable bitness per process
    #[arg(long)]
    pub slow_fields: bool,

    /// Maximum processes listed (0 = all)
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Process ordering
    #[arg(long, value_enum)]
    pub sort: Option<ProcessSort>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check which raw sources are readable and validate configuration
    Check {
        /// Also list sources that are optional
        #[arg(long)]
        verbose: bool,
    },

    /// Collect a full snapshot and serialize it
    Snapshot {
        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Output file path ("-" or absent = stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Only list direct children of this pid
        #[arg(long)]
        parent: Option<u32>,

        /// Include running and stopped services
        #[arg(long)]
        services: bool,
    },

    /// Print the effective configuration
    Config {
        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Print built-in defaults instead of the effective configuration
        #[arg(long)]
        defaults: bool,
    },
}
