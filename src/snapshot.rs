//! Point-in-time aggregate of everything a [`Platform`] can report.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::platform::Platform;
use crate::process::{OsService, ProcessQuery, ProcessRecord};
use crate::release::OsIdentity;
use crate::system::LoadAverage;
use crate::ticks::{FrequencySnapshot, TickSnapshot};
use crate::topology::Topology;

#[derive(Debug, Clone, Serialize)]
pub struct HostSnapshot {
    pub collected_at: DateTime<Utc>,
    pub backend: &'static str,
    pub os: OsIdentity,
    pub topology: Topology,
    pub system_ticks: Option<TickSnapshot>,
    pub processor_ticks: Vec<TickSnapshot>,
    pub frequencies: FrequencySnapshot,
    pub load_average: LoadAverage,
    pub context_switches: i64,
    pub interrupts: i64,
    pub uptime_secs: i64,
    pub boot_time_secs: i64,
    /// Pid of the collecting process.
    pub process_id: i64,
    pub process_count: usize,
    pub thread_count: i64,
    pub processes: Vec<ProcessRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<OsService>>,
}

/// What to include beyond the fixed host facts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotOptions {
    pub query: ProcessQuery,
    /// Restrict the process list to direct children of this pid.
    pub parent_pid: Option<u32>,
    pub services: bool,
}

impl HostSnapshot {
    pub fn collect(platform: &dyn Platform, options: &SnapshotOptions) -> Self {
        let processes = match options.parent_pid {
            Some(ppid) => platform.child_processes(ppid, &options.query),
            None => platform.processes(&options.query),
        };
        Self {
            collected_at: Utc::now(),
            backend: platform.name(),
            os: platform.os_identity().clone(),
            topology: platform.topology().clone(),
            system_ticks: platform.system_ticks(),
            processor_ticks: platform.processor_ticks(),
            frequencies: platform.frequencies(),
            load_average: platform.load_average(),
            context_switches: platform.context_switches(),
            interrupts: platform.interrupts(),
            uptime_secs: platform.uptime_secs(),
            boot_time_secs: platform.boot_time_secs(),
            process_id: platform.process_id(),
            process_count: platform.process_count(),
            thread_count: platform.thread_count(),
            processes,
            services: options.services.then(|| platform.services()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::UnsupportedPlatform;

    #[test]
    fn test_collect_unsupported() {
        let platform = UnsupportedPlatform::new();
        let snapshot = HostSnapshot::collect(&platform, &SnapshotOptions::default());
        assert_eq!(snapshot.backend, "unsupported");
        assert!(snapshot.processes.is_empty());
        assert!(snapshot.services.is_none());
        assert_eq!(snapshot.processor_ticks.len(), 1);
        assert_eq!(snapshot.process_id, -1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["load_average"]["one_min"], -1.0);
        assert_eq!(json["topology"]["processors"][0]["processor_number"], 0);
        assert!(json.get("services").is_none());
    }
}
