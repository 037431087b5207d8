//! Platform capability interface.
//!
//! One [`Platform`] implementation per acquisition backend, selected at
//! startup. Identity and topology are resolved once per instance; process
//! tables and tick snapshots are rebuilt on every call.

mod linux;
mod unsupported;

pub use linux::LinuxPlatform;
pub use unsupported::UnsupportedPlatform;

use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::process::{OsService, ProcessQuery, ProcessRecord};
use crate::release::OsIdentity;
use crate::source::FsSource;
use crate::system::LoadAverage;
use crate::ticks::{FrequencySnapshot, TickSnapshot};
use crate::topology::Topology;

/// Integer value for "not available on this platform".
pub const UNSUPPORTED: i64 = -1;

static CURRENT: OnceCell<Box<dyn Platform>> = OnceCell::new();

pub trait Platform: Send + Sync {
    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;

    fn os_identity(&self) -> &OsIdentity;

    fn topology(&self) -> &Topology;

    fn processes(&self, query: &ProcessQuery) -> Vec<ProcessRecord>;

    fn child_processes(&self, parent_pid: u32, query: &ProcessQuery) -> Vec<ProcessRecord>;

    /// One process with all optional fields, `None` once it has exited.
    fn process(&self, pid: u32) -> Option<ProcessRecord>;

    fn process_count(&self) -> usize;

    /// CPU affinity bitmask of `pid`, 0 when it cannot be read.
    fn process_affinity_mask(&self, pid: u32) -> i64;

    /// Pid of the calling process, `-1` when unsupported.
    fn process_id(&self) -> i64;

    /// Total threads, `-1` when unsupported.
    fn thread_count(&self) -> i64;

    fn services(&self) -> Vec<OsService>;

    /// Fresh host-wide ticks, `None` when no source could be read.
    fn system_ticks(&self) -> Option<TickSnapshot>;

    /// Fresh per-processor ticks keyed by dense logical index; returns
    /// false and leaves `target` untouched when nothing could be read.
    fn refresh_processor_ticks(&self, target: &mut Vec<TickSnapshot>) -> bool;

    /// Overwrites `target` only when a fresh reading exists.
    fn refresh_system_ticks(&self, target: &mut TickSnapshot) -> bool {
        match self.system_ticks() {
            Some(ticks) => {
                *target = ticks;
                true
            }
            None => false,
        }
    }

    /// Per-processor ticks, zero for processors without a reading.
    fn processor_ticks(&self) -> Vec<TickSnapshot> {
        let mut ticks = Vec::new();
        self.refresh_processor_ticks(&mut ticks);
        ticks.resize(
            self.topology().logical_processor_count(),
            TickSnapshot::default(),
        );
        ticks
    }

    fn frequencies(&self) -> FrequencySnapshot;

    fn load_average(&self) -> LoadAverage;

    /// `-1` when unsupported.
    fn context_switches(&self) -> i64;

    /// `-1` when unsupported.
    fn interrupts(&self) -> i64;

    /// `-1` when unsupported.
    fn uptime_secs(&self) -> i64;

    /// `-1` when unsupported.
    fn boot_time_secs(&self) -> i64;
}

#[cfg(target_os = "linux")]
fn native() -> Box<dyn Platform> {
    Box::new(LinuxPlatform::new())
}

#[cfg(not(target_os = "linux"))]
fn native() -> Box<dyn Platform> {
    Box::new(UnsupportedPlatform::new())
}

/// Process-wide platform for the running host, created on first use.
pub fn current() -> &'static dyn Platform {
    CURRENT
        .get_or_init(|| {
            let platform = native();
            info!("Using {} platform backend", platform.name());
            platform
        })
        .as_ref()
}

/// Platform reading from `root` (a mounted host `/proc`, or a captured
/// tree), or the native backend when `root` is `None`.
pub fn open(root: Option<&Path>, allow_commands: bool) -> Box<dyn Platform> {
    match root {
        Some(root) => {
            let source = FsSource::with_root(root).allow_commands(allow_commands);
            Box::new(LinuxPlatform::detect(Arc::new(source)))
        }
        None if cfg!(target_os = "linux") => {
            let source = FsSource::new().allow_commands(allow_commands);
            Box::new(LinuxPlatform::detect(Arc::new(source)))
        }
        None => native(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_is_stable() {
        let a = current() as *const dyn Platform as *const ();
        let b = current() as *const dyn Platform as *const ();
        assert_eq!(a, b);
        assert!(current().topology().logical_processor_count() >= 1);
    }

    #[test]
    fn test_open_with_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let platform = open(Some(dir.path()), false);
        assert_eq!(platform.name(), "linux");
        assert_eq!(platform.process_count(), 0);
        assert_eq!(platform.topology().logical_processor_count(), 1);
        assert_eq!(platform.load_average(), LoadAverage::unsupported());
        assert_eq!(platform.context_switches(), UNSUPPORTED);
    }
}
