//! Config command implementation.
//!
//! Prints the effective or built-in configuration.

use crate::cli::ConfigFormat;
use crate::config::{show_config, Config};

pub fn command_config(
    effective: &Config,
    format: ConfigFormat,
    defaults: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if defaults {
        show_config(&Config::default(), format)
    } else {
        // JSON has no comment syntax.
        if format != ConfigFormat::Json {
            println!("# Effective configuration (CLI > config file > defaults)");
        }
        show_config(effective, format)
    }
}
