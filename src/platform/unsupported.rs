use super::{Platform, UNSUPPORTED};
use crate::process::{OsService, ProcessQuery, ProcessRecord};
use crate::release::OsIdentity;
use crate::system::LoadAverage;
use crate::ticks::{FrequencySnapshot, TickSnapshot};
use crate::topology::Topology;

/// Backend for hosts without an acquisition implementation: every query
/// answers with its sentinel.
pub struct UnsupportedPlatform {
    identity: OsIdentity,
    topology: Topology,
}

impl Default for UnsupportedPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl UnsupportedPlatform {
    pub fn new() -> Self {
        Self {
            identity: OsIdentity::unknown(),
            topology: Topology::single(),
        }
    }
}

impl Platform for UnsupportedPlatform {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn os_identity(&self) -> &OsIdentity {
        &self.identity
    }

    fn topology(&self) -> &Topology {
        &self.topology
    }

    fn processes(&self, _query: &ProcessQuery) -> Vec<ProcessRecord> {
        Vec::new()
    }

    fn child_processes(&self, _parent_pid: u32, _query: &ProcessQuery) -> Vec<ProcessRecord> {
        Vec::new()
    }

    fn process(&self, _pid: u32) -> Option<ProcessRecord> {
        None
    }

    fn process_count(&self) -> usize {
        0
    }

    fn process_affinity_mask(&self, _pid: u32) -> i64 {
        0
    }

    fn process_id(&self) -> i64 {
        UNSUPPORTED
    }

    fn thread_count(&self) -> i64 {
        UNSUPPORTED
    }

    fn services(&self) -> Vec<OsService> {
        Vec::new()
    }

    fn system_ticks(&self) -> Option<TickSnapshot> {
        None
    }

    fn refresh_processor_ticks(&self, _target: &mut Vec<TickSnapshot>) -> bool {
        false
    }

    fn frequencies(&self) -> FrequencySnapshot {
        FrequencySnapshot::unsupported(self.topology.logical_processor_count())
    }

    fn load_average(&self) -> LoadAverage {
        LoadAverage::unsupported()
    }

    fn context_switches(&self) -> i64 {
        UNSUPPORTED
    }

    fn interrupts(&self) -> i64 {
        UNSUPPORTED
    }

    fn uptime_secs(&self) -> i64 {
        UNSUPPORTED
    }

    fn boot_time_secs(&self) -> i64 {
        UNSUPPORTED
    }
}
