//! Process table acquisition.
//!
//! This module provides:
//! - `affinity`: per-process CPU affinity masks
//! - `stat`: `/proc/<pid>/stat` field parsing
//! - `record`: process records, states and ordering
//! - `users`: uid/gid name cache
//! - `builder`: per-PID record construction and enumeration
//! - `services`: running/stopped service listing

pub mod affinity;
pub mod builder;
pub mod record;
pub mod services;
pub mod stat;
pub mod users;

// Re-export commonly used types
pub use affinity::read_process_affinity_mask;
pub use builder::ProcessTableBuilder;
pub use record::{sort_and_limit, ProcessQuery, ProcessRecord, ProcessSort, ProcessState};
pub use services::{list_services, OsService, ServiceState};
pub use stat::{parse_stat_line, StatLine, MAX_STAT_ORDINAL};
