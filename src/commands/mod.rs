//! CLI command implementations for herakles-host-telemetry.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Raw source availability and configuration validation
//! - `snapshot`: Full snapshot serialization
//! - `config`: Effective configuration output

pub mod check;
pub mod config;
pub mod snapshot;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use snapshot::command_snapshot;
