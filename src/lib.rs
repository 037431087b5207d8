//! Herakles Host Telemetry Library
//!
//! Discovers the operating system identity, processor topology, live process
//! table and CPU counters of a host by reading kernel pseudo-files, OS
//! descriptor files and diagnostic commands, and normalizes them into one
//! data model.
//!
//! # Features
//!
//! - **Release resolution**: ordered cascade over release files, `os-release`,
//!   `lsb_release` and a filename scan
//! - **Topology**: package, core, logical processor and NUMA node from
//!   affinity masks
//! - **Process table**: per-PID records, parent/child queries, sorting and limits
//! - **Ticks and frequencies**: jiffies and 100 ns counters normalized to
//!   milliseconds without double counting interrupt time
//!
//! Nothing in the acquisition layer fails: missing data becomes an empty
//! collection, a dropped record or a `-1` sentinel.
//!
//! # Usage
//!
//! ```rust,no_run
//! use herakles_host_telemetry::platform;
//! use herakles_host_telemetry::process::{ProcessQuery, ProcessSort};
//!
//! let host = platform::current();
//! println!("{}", host.os_identity());
//! println!("{} logical processors", host.topology().logical_processor_count());
//!
//! let query = ProcessQuery {
//!     limit: 5,
//!     sort: ProcessSort::Cpu,
//!     slow_fields: false,
//! };
//! for p in host.processes(&query) {
//!     println!("{} {} {}ms", p.pid, p.name, p.user_time_ms + p.kernel_time_ms);
//! }
//! ```

pub mod error;
pub mod host;
pub mod platform;
pub mod process;
pub mod release;
pub mod snapshot;
pub mod source;
pub mod system;
pub mod ticks;
pub mod topology;

// Re-export main types for convenience
pub use error::{Result, TelemetryError};
pub use host::HostConstants;
pub use platform::{LinuxPlatform, Platform, UnsupportedPlatform};
pub use process::{OsService, ProcessQuery, ProcessRecord, ProcessSort, ProcessState};
pub use release::OsIdentity;
pub use snapshot::{HostSnapshot, SnapshotOptions};
pub use source::{FsSource, MemorySource, SourceReader};
pub use system::LoadAverage;
pub use ticks::{FrequencySnapshot, TickSnapshot, TickType};
pub use topology::{LogicalProcessor, Topology};
