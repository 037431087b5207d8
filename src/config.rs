//! Configuration management for herakles-host-telemetry.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use herakles_host_telemetry::process::{ProcessQuery, ProcessSort};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_PROCESS_LIMIT: usize = 0;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const VALID_LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Acquisition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Alternate root for all source paths (mounted host /proc, captured tree)
    pub root: Option<PathBuf>,
    /// Permit external diagnostic commands (lsb_release, uname, systemctl)
    pub allow_commands: Option<bool>,
    /// Count open descriptors and probe executable bitness
    pub slow_fields: Option<bool>,
    /// Maximum processes in a listing, 0 = all
    pub process_limit: Option<usize>,
    pub process_sort: Option<ProcessSort>,
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: None,
            allow_commands: Some(true),
            slow_fields: Some(false),
            process_limit: Some(DEFAULT_PROCESS_LIMIT),
            process_sort: Some(ProcessSort::default()),
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
        }
    }
}

impl Config {
    /// Process query derived from the effective settings.
    pub fn process_query(&self) -> ProcessQuery {
        ProcessQuery {
            limit: self.process_limit.unwrap_or(DEFAULT_PROCESS_LIMIT),
            sort: self.process_sort.unwrap_or_default(),
            slow_fields: self.slow_fields.unwrap_or(false),
        }
    }
}

/// Validate effective config (used by `check` and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(root) = &cfg.root {
        if !root.is_dir() {
            return Err(format!("root '{}' is not a directory", root.display()).into());
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if !VALID_LOG_LEVELS.contains(&level) {
            return Err(format!(
                "Invalid log_level '{}', expected one of {}",
                level,
                VALID_LOG_LEVELS.join(", ")
            )
            .into());
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(root) = &args.root {
        config.root = Some(root.clone());
    }
    if args.no_commands {
        config.allow_commands = Some(false);
    }
    if args.slow_fields {
        config.slow_fields = Some(true);
    }
    if let Some(limit) = args.limit {
        config.process_limit = Some(limit);
    }
    if let Some(sort) = args.sort {
        config.process_sort = Some(sort);
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            // Try default locations
            let defaults = [
                "/etc/herakles/host-telemetry.yaml",
                "/etc/herakles/host-telemetry.yml",
                "/etc/herakles/host-telemetry.json",
                "./herakles-host-telemetry.yaml",
                "./herakles-host-telemetry.yml",
                "./herakles-host-telemetry.json",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(p) => PathBuf::from(p),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Err(format!("config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;
    parse_config(&content, &path)
}

fn parse_config(content: &str, path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml_config() {
        let file = write_config(".yaml", "process_limit: 5\nprocess_sort: cpu\n");
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.process_limit, Some(5));
        assert_eq!(config.process_sort, Some(ProcessSort::Cpu));
        assert_eq!(config.root, None);
    }

    #[test]
    fn test_load_json_and_toml_config() {
        let json = write_config(".json", r#"{"slow_fields": true, "log_level": "debug"}"#);
        let config = load_config(Some(json.path())).unwrap();
        assert_eq!(config.slow_fields, Some(true));
        assert_eq!(config.log_level.as_deref(), Some("debug"));

        let toml = write_config(".toml", "allow_commands = false\nprocess_sort = \"memory\"\n");
        let config = load_config(Some(toml.path())).unwrap();
        assert_eq!(config.allow_commands, Some(false));
        assert_eq!(config.process_sort, Some(ProcessSort::Memory));
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        assert!(load_config(Some(Path::new("/nonexistent/host-telemetry.yaml"))).is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = write_config(".yaml", "process_limit: 5\nslow_fields: false\n");
        let path = file.path().to_str().unwrap().to_string();
        let args = Args::parse_from(["herakles-host-telemetry", "-c", &path, "--limit", "10", "--slow-fields"]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.process_limit, Some(10));
        assert_eq!(config.slow_fields, Some(true));
        let query = config.process_query();
        assert_eq!(query.limit, 10);
        assert!(query.slow_fields);
    }

    #[test]
    fn test_validate_effective_config() {
        assert!(validate_effective_config(&Config::default()).is_ok());

        let bad_level = Config {
            log_level: Some("loud".to_string()),
            ..Config::default()
        };
        assert!(validate_effective_config(&bad_level).is_err());

        let bad_root = Config {
            root: Some(PathBuf::from("/nonexistent/root")),
            ..Config::default()
        };
        assert!(validate_effective_config(&bad_root).is_err());
    }

    #[test]
    fn test_render_round_trips_yaml() {
        let config = Config::default();
        let yaml = render_config(&config, ConfigFormat::Yaml).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }
}
