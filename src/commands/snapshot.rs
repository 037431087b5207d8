//! Snapshot command implementation.
//!
//! Collects a full host snapshot and writes it as YAML, JSON or TOML.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use herakles_host_telemetry::platform::Platform;
use herakles_host_telemetry::{HostSnapshot, SnapshotOptions};

use crate::cli::ConfigFormat;
use crate::config::Config;

pub fn render_snapshot(snapshot: &HostSnapshot, format: ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(snapshot)?,
        // Through a Value so plain keys are emitted before tables.
        ConfigFormat::Toml => toml::to_string_pretty(&toml::Value::try_from(snapshot)?)?,
        ConfigFormat::Yaml => serde_yaml::to_string(snapshot)?,
    })
}

pub fn command_snapshot(
    platform: &dyn Platform,
    config: &Config,
    format: ConfigFormat,
    output: Option<PathBuf>,
    parent: Option<u32>,
    services: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = SnapshotOptions {
        query: config.process_query(),
        parent_pid: parent,
        services,
    };

    let start = Instant::now();
    let snapshot = HostSnapshot::collect(platform, &options);
    info!(
        "Collected snapshot with {} processes in {:.2?}",
        snapshot.processes.len(),
        start.elapsed()
    );

    let content = render_snapshot(&snapshot, format)?;
    match output {
        Some(path) if path.to_string_lossy() != "-" => {
            fs::write(&path, content)?;
            println!("✅ Snapshot written to: {}", path.display());
        }
        _ => print!("{}", content),
    }
    Ok(())
}
