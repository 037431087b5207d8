use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, info};

use super::{Platform, UNSUPPORTED};
use crate::host::{read_uptime_secs, HostConstants};
use crate::process::{
    list_services, read_process_affinity_mask, OsService, ProcessQuery, ProcessRecord,
    ProcessTableBuilder,
};
use crate::release::{resolve_os_identity, OsIdentity};
use crate::source::{FsSource, SourceReader};
use crate::system::{read_load_average, read_stat_counters, read_thread_count, LoadAverage};
use crate::ticks::frequency::read_linux_frequencies;
use crate::ticks::{FrequencySnapshot, TickReader, TickSnapshot};
use crate::topology::{read_topology, Topology};

/// procfs/sysfs backend over any [`SourceReader`].
pub struct LinuxPlatform {
    source: Arc<dyn SourceReader>,
    host: HostConstants,
    identity: OnceCell<OsIdentity>,
    topology: OnceCell<Topology>,
}

impl Default for LinuxPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxPlatform {
    /// Live filesystem with the process-wide host constants.
    pub fn new() -> Self {
        Self::with_source(Arc::new(FsSource::new()), *HostConstants::global())
    }

    /// Detects host constants from `source` itself.
    pub fn detect(source: Arc<dyn SourceReader>) -> Self {
        let host = HostConstants::detect(source.as_ref());
        Self::with_source(source, host)
    }

    pub fn with_source(source: Arc<dyn SourceReader>, host: HostConstants) -> Self {
        Self {
            source,
            host,
            identity: OnceCell::new(),
            topology: OnceCell::new(),
        }
    }

    pub fn host(&self) -> &HostConstants {
        &self.host
    }

    pub fn source(&self) -> &dyn SourceReader {
        self.source.as_ref()
    }

    fn builder(&self) -> ProcessTableBuilder<'_> {
        ProcessTableBuilder::new(self.source.as_ref(), self.host)
    }

    fn ticks(&self) -> TickReader<'_> {
        TickReader::new(self.source.as_ref(), self.host.ticks_per_second)
    }
}

impl Platform for LinuxPlatform {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn os_identity(&self) -> &OsIdentity {
        self.identity.get_or_init(|| {
            let identity = resolve_os_identity(self.source.as_ref());
            info!("Operating system: {}", identity);
            identity
        })
    }

    fn topology(&self) -> &Topology {
        self.topology
            .get_or_init(|| read_topology(self.source.as_ref()))
    }

    fn processes(&self, query: &ProcessQuery) -> Vec<ProcessRecord> {
        self.builder().enumerate(query)
    }

    fn child_processes(&self, parent_pid: u32, query: &ProcessQuery) -> Vec<ProcessRecord> {
        self.builder().children(parent_pid, query)
    }

    fn process(&self, pid: u32) -> Option<ProcessRecord> {
        self.builder().process(pid, true)
    }

    fn process_count(&self) -> usize {
        self.builder().process_count()
    }

    fn process_affinity_mask(&self, pid: u32) -> i64 {
        read_process_affinity_mask(self.source.as_ref(), pid)
    }

    fn process_id(&self) -> i64 {
        i64::from(std::process::id())
    }

    fn thread_count(&self) -> i64 {
        match read_thread_count(self.source.as_ref()) {
            Ok(count) => count as i64,
            Err(e) => {
                debug!("Thread count unavailable: {}", e);
                UNSUPPORTED
            }
        }
    }

    fn services(&self) -> Vec<OsService> {
        list_services(self.source.as_ref(), &self.builder())
    }

    fn system_ticks(&self) -> Option<TickSnapshot> {
        self.ticks().system_ticks()
    }

    fn refresh_processor_ticks(&self, target: &mut Vec<TickSnapshot>) -> bool {
        self.ticks().refresh_processor_ticks(self.topology(), target)
    }

    fn frequencies(&self) -> FrequencySnapshot {
        read_linux_frequencies(self.source.as_ref(), self.topology())
    }

    fn load_average(&self) -> LoadAverage {
        read_load_average(self.source.as_ref()).unwrap_or_else(|e| {
            debug!("Load average unavailable: {}", e);
            LoadAverage::unsupported()
        })
    }

    fn context_switches(&self) -> i64 {
        read_stat_counters(self.source.as_ref())
            .map(|c| c.context_switches as i64)
            .unwrap_or(UNSUPPORTED)
    }

    fn interrupts(&self) -> i64 {
        read_stat_counters(self.source.as_ref())
            .map(|c| c.interrupts as i64)
            .unwrap_or(UNSUPPORTED)
    }

    fn uptime_secs(&self) -> i64 {
        read_uptime_secs(self.source.as_ref()).map_or(UNSUPPORTED, |u| u as i64)
    }

    fn boot_time_secs(&self) -> i64 {
        if self.host.boot_time_secs > 0 {
            self.host.boot_time_secs
        } else {
            UNSUPPORTED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use crate::ticks::TickType;

    fn fixture() -> MemorySource {
        MemorySource::new()
            .with_file("/etc/os-release", "NAME=Debian\nVERSION=\"12 (bookworm)\"\n")
            .with_file("/proc/loadavg", "0.10 0.20 0.30 2/300 999\n")
            .with_file(
                "/proc/stat",
                "cpu  100 0 50 1000 0 0 0 0\ncpu0 60 0 30 500 0 0 0 0\ncpu1 40 0 20 500 0 0 0 0\nintr 42 0\nctxt 77\nbtime 1700000000\n",
            )
            .with_file("/proc/uptime", "3600.50 7000.00\n")
            .with_file(
                "/proc/cpuinfo",
                "processor\t: 0\ncore id\t: 0\n\nprocessor\t: 1\ncore id\t: 1\n",
            )
    }

    fn platform(source: MemorySource) -> LinuxPlatform {
        LinuxPlatform::with_source(Arc::new(source), HostConstants::default())
    }

    #[test]
    fn test_identity_is_cached() {
        let p = platform(fixture());
        let first = p.os_identity() as *const OsIdentity;
        assert_eq!(p.os_identity().family, "Debian");
        assert_eq!(p.os_identity().code_name, "bookworm");
        assert_eq!(first, p.os_identity() as *const OsIdentity);
    }

    #[test]
    fn test_system_counters() {
        let p = platform(fixture());
        assert_eq!(p.thread_count(), 300);
        assert_eq!(p.context_switches(), 77);
        assert_eq!(p.interrupts(), 42);
        assert_eq!(p.uptime_secs(), 3600);
        assert_eq!(p.load_average().as_array(), [0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_ticks_through_platform() {
        let p = platform(fixture());
        let system = p.system_ticks().expect("system ticks");
        assert_eq!(system[TickType::User], 1000);
        let per_cpu = p.processor_ticks();
        assert_eq!(per_cpu.len(), 2);
        assert_eq!(per_cpu[1][TickType::System], 200);
    }

    #[test]
    fn test_process_affinity_and_id() {
        let source = fixture()
            .with_command(&["taskset", "-p", "3283"], &["pid 3283's current affinity mask: 3"])
            .with_command(&["taskset", "-p", "9"], &["not a mask"]);
        let p = platform(source);
        assert_eq!(p.process_affinity_mask(3283), 3);
        assert_eq!(p.process_affinity_mask(9), 0);
        assert_eq!(p.process_affinity_mask(1), 0);
        assert_eq!(p.process_id(), i64::from(std::process::id()));
    }

    #[test]
    fn test_sentinels_without_sources() {
        let p = platform(MemorySource::new());
        assert_eq!(p.thread_count(), UNSUPPORTED);
        assert_eq!(p.interrupts(), UNSUPPORTED);
        assert_eq!(p.uptime_secs(), UNSUPPORTED);
        assert_eq!(p.boot_time_secs(), UNSUPPORTED);
        assert_eq!(p.load_average(), LoadAverage::unsupported());
        assert!(p.system_ticks().is_none());
        assert_eq!(p.frequencies(), FrequencySnapshot::unsupported(1));
        assert!(p.processes(&ProcessQuery::default()).is_empty());
    }
}
