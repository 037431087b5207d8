//! Process records and the ordering applied after enumeration.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Scheduler state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    Running,
    Sleeping,
    Waiting,
    Zombie,
    Stopped,
    Other,
}

impl ProcessState {
    /// Maps the single-character state code of `/proc/<pid>/status`.
    pub fn from_code(code: char) -> Self {
        match code {
            'R' => Self::Running,
            'S' => Self::Sleeping,
            'D' => Self::Waiting,
            'Z' => Self::Zombie,
            'T' => Self::Stopped,
            _ => Self::Other,
        }
    }
}

/// One process, materialized fresh on every enumeration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub parent_pid: u32,
    pub name: String,
    pub path: String,
    pub command_line: String,
    pub state: ProcessState,
    pub priority: i64,
    pub thread_count: u64,
    /// Milliseconds since the epoch.
    pub start_time_ms: i64,
    pub up_time_ms: i64,
    pub user_time_ms: u64,
    pub kernel_time_ms: u64,
    pub virtual_size: u64,
    pub resident_set_size: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    /// Open descriptors; 0 unless slow fields were requested.
    pub open_files: u64,
    /// 32 or 64; 0 when not probed.
    pub bitness: u8,
    pub user_id: String,
    pub user_name: String,
    pub group_id: String,
    pub group_name: String,
    pub cwd: String,
}

impl ProcessRecord {
    /// Average CPU load over the process lifetime.
    pub fn cumulative_cpu_load(&self) -> f64 {
        if self.up_time_ms > 0 {
            (self.user_time_ms + self.kernel_time_ms) as f64 / self.up_time_ms as f64
        } else {
            0.0
        }
    }
}

/// Ordering key for process listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProcessSort {
    /// Highest cumulative CPU load first
    Cpu,
    /// Largest resident set first
    Memory,
    /// Earliest start time first
    Oldest,
    /// Latest start time first
    Newest,
    /// Ascending pid
    #[default]
    Pid,
    /// Ascending parent pid
    Parent,
    /// Name, case-insensitive
    Name,
}

impl ProcessSort {
    pub fn compare(self, a: &ProcessRecord, b: &ProcessRecord) -> Ordering {
        match self {
            Self::Cpu => b
                .cumulative_cpu_load()
                .partial_cmp(&a.cumulative_cpu_load())
                .unwrap_or(Ordering::Equal),
            Self::Memory => b.resident_set_size.cmp(&a.resident_set_size),
            Self::Oldest => a.start_time_ms.cmp(&b.start_time_ms),
            Self::Newest => b.start_time_ms.cmp(&a.start_time_ms),
            Self::Pid => a.pid.cmp(&b.pid),
            Self::Parent => a.parent_pid.cmp(&b.parent_pid),
            Self::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        }
        .then_with(|| a.pid.cmp(&b.pid))
    }
}

/// Options for an enumeration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessQuery {
    /// Maximum records returned; 0 means all.
    pub limit: usize,
    pub sort: ProcessSort,
    /// Count open descriptors and probe executable bitness.
    pub slow_fields: bool,
}

/// Sorts the fully materialized list, then truncates it.
pub fn sort_and_limit(mut records: Vec<ProcessRecord>, sort: ProcessSort, limit: usize) -> Vec<ProcessRecord> {
    records.sort_by(|a, b| sort.compare(a, b));
    if limit > 0 {
        records.truncate(limit);
    }
    records
}

#[cfg(test)]
pub(crate) fn record(pid: u32, parent_pid: u32) -> ProcessRecord {
    ProcessRecord {
        pid,
        parent_pid,
        name: format!("proc{}", pid),
        path: String::new(),
        command_line: String::new(),
        state: ProcessState::Sleeping,
        priority: 20,
        thread_count: 1,
        start_time_ms: 0,
        up_time_ms: 0,
        user_time_ms: 0,
        kernel_time_ms: 0,
        virtual_size: 0,
        resident_set_size: 0,
        bytes_read: 0,
        bytes_written: 0,
        open_files: 0,
        bitness: 0,
        user_id: "0".into(),
        user_name: "root".into(),
        group_id: "0".into(),
        group_name: "root".into(),
        cwd: String::new(),
    }
}
