//! Check command implementation.
//!
//! Reports which raw sources are readable and validates configuration.

use herakles_host_telemetry::host::detect_stat_width;
use herakles_host_telemetry::platform::Platform;
use herakles_host_telemetry::source::{FsSource, SourceReader};

use crate::config::{validate_effective_config, Config};

/// Sources every Linux backend relies on.
const REQUIRED_SOURCES: [&str; 4] = ["/proc/stat", "/proc/uptime", "/proc/self/stat", "/proc/loadavg"];

/// Sources with a fallback when absent.
const OPTIONAL_SOURCES: [&str; 7] = [
    "/etc/system-release",
    "/etc/os-release",
    "/etc/lsb-release",
    "/proc/version",
    "/proc/cpuinfo",
    "/sys/devices/system/cpu",
    "/sys/devices/system/node",
];

/// Outcome of the source checks, separated from printing for testing.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub missing_required: Vec<&'static str>,
    pub missing_optional: Vec<&'static str>,
    pub stat_width: usize,
    pub process_count: usize,
}

impl CheckReport {
    pub fn collect(source: &dyn SourceReader, platform: &dyn Platform) -> Self {
        Self {
            missing_required: REQUIRED_SOURCES
                .iter()
                .copied()
                .filter(|p| !source.exists(p))
                .collect(),
            missing_optional: OPTIONAL_SOURCES
                .iter()
                .copied()
                .filter(|p| !source.exists(p))
                .collect(),
            stat_width: detect_stat_width(&source.read_text("/proc/self/stat")),
            process_count: platform.process_count(),
        }
    }

    pub fn ok(&self) -> bool {
        self.missing_required.is_empty() && self.process_count > 0
    }
}

/// Validates source availability and configuration.
pub fn command_check(
    verbose: bool,
    config: &Config,
    platform: &dyn Platform,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles Host Telemetry - Source Check");
    println!("==========================================");

    let mut all_ok = true;
    let source = match &config.root {
        Some(root) => FsSource::with_root(root),
        None => FsSource::new(),
    }
    .allow_commands(config.allow_commands.unwrap_or(true));
    let report = CheckReport::collect(&source, platform);

    println!("\n📁 Checking required sources...");
    for path in REQUIRED_SOURCES {
        if report.missing_required.contains(&path) {
            println!("   ❌ {} not readable", path);
        } else {
            println!("   ✅ {}", path);
        }
    }
    if report.process_count > 0 {
        println!(
            "   ✅ {} process entries, stat width {}",
            report.process_count, report.stat_width
        );
    } else {
        println!("   ❌ Cannot read any process entries");
    }
    all_ok &= report.ok();

    if verbose {
        println!("\n📄 Checking optional sources...");
        for path in OPTIONAL_SOURCES {
            if report.missing_optional.contains(&path) {
                println!("   ⚠️  {} missing (fallback in use)", path);
            } else {
                println!("   ✅ {}", path);
            }
        }
        println!("\n🖥️  Resolved identity: {}", platform.os_identity());
        let topology = platform.topology();
        println!(
            "   {} logical / {} cores / {} packages / {} NUMA nodes",
            topology.logical_processor_count(),
            topology.physical_core_count(),
            topology.package_count(),
            topology.numa_node_count()
        );
    }

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
