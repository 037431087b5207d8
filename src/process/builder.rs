//! Per-PID process record construction from `/proc`.
//!
//! A record is only emitted when its stat line could be read and parsed.
//! Every other source (io, status, links, descriptors) is optional and falls
//! back to an empty or zero value.

use tracing::{debug, trace};

use crate::host::{now_ms, HostConstants};
use crate::process::record::{sort_and_limit, ProcessQuery, ProcessRecord, ProcessState};
use crate::process::stat::{parse_parent_pid, parse_stat_line};
use crate::process::users::UserGroupInfo;
use crate::source::{parse_u64_or, SourceReader};

const DELETED_SUFFIX: &str = " (deleted)";

/// ELF `EI_CLASS` value for 32-bit objects.
const ELFCLASS32: u8 = 1;

/// Builds process records from the procfs of one host.
pub struct ProcessTableBuilder<'a> {
    source: &'a dyn SourceReader,
    host: HostConstants,
}

impl<'a> ProcessTableBuilder<'a> {
    pub fn new(source: &'a dyn SourceReader, host: HostConstants) -> Self {
        Self { source, host }
    }

    /// Numeric directory names under `/proc`.
    pub fn pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self
            .source
            .list_dir("/proc")
            .iter()
            .filter(|name| !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()))
            .filter_map(|name| name.parse().ok())
            .collect();
        pids.sort_unstable();
        pids.dedup();
        pids
    }

    pub fn process_count(&self) -> usize {
        self.pids().len()
    }

    pub fn parent_pid(&self, pid: u32) -> Option<u32> {
        parse_parent_pid(&self.source.read_text(&format!("/proc/{}/stat", pid)))
    }

    /// All live processes, sorted and truncated per `query`.
    pub fn enumerate(&self, query: &ProcessQuery) -> Vec<ProcessRecord> {
        let mut users = UserGroupInfo::load(self.source);
        let records: Vec<ProcessRecord> = self
            .pids()
            .into_iter()
            .filter_map(|pid| self.build(pid, &mut users, query.slow_fields))
            .collect();
        debug!("Materialized {} process records", records.len());
        sort_and_limit(records, query.sort, query.limit)
    }

    /// Direct children of `parent_pid`, sorted and truncated per `query`.
    pub fn children(&self, parent_pid: u32, query: &ProcessQuery) -> Vec<ProcessRecord> {
        let mut users = UserGroupInfo::load(self.source);
        let records: Vec<ProcessRecord> = self
            .pids()
            .into_iter()
            .filter(|pid| self.parent_pid(*pid) == Some(parent_pid))
            .filter_map(|pid| self.build(pid, &mut users, query.slow_fields))
            .filter(|p| p.parent_pid == parent_pid)
            .collect();
        sort_and_limit(records, query.sort, query.limit)
    }

    /// One process, or `None` if it is gone or its stat line is unusable.
    pub fn process(&self, pid: u32, slow_fields: bool) -> Option<ProcessRecord> {
        let mut users = UserGroupInfo::load(self.source);
        self.build(pid, &mut users, slow_fields)
    }

    fn build(&self, pid: u32, users: &mut UserGroupInfo, slow_fields: bool) -> Option<ProcessRecord> {
        let now = now_ms();
        let stat = self.source.read_text(&format!("/proc/{}/stat", pid));
        if stat.is_empty() {
            // Exited between listing and reading.
            trace!("pid {} vanished before stat could be read", pid);
            return None;
        }
        let stat = match parse_stat_line(&stat, self.host.stat_width) {
            Ok(s) => s,
            Err(e) => {
                debug!("Dropping pid {}: {}", pid, e);
                return None;
            }
        };

        let mut start_time_ms =
            self.host.boot_time_ms + self.host.ticks_to_ms(stat.start_ticks) as i64;
        // Boot time is only accurate to a few ms.
        if start_time_ms >= now {
            start_time_ms = now - 1;
        }

        let io = self
            .source
            .read_key_value(&format!("/proc/{}/io", pid), ':');
        let status = self
            .source
            .read_key_value(&format!("/proc/{}/status", pid), ':');

        let state_code = status
            .get("State")
            .and_then(|s| s.chars().next())
            .unwrap_or('U');
        let user_id = first_token(status.get("Uid"));
        let group_id = first_token(status.get("Gid"));
        let user_name = match user_id.parse::<u32>() {
            Ok(uid) => users.user_name(self.source, uid),
            Err(_) => String::new(),
        };
        let group_name = match group_id.parse::<u32>() {
            Ok(gid) => users.group_name(self.source, gid),
            Err(_) => String::new(),
        };

        let path = self
            .source
            .read_link(&format!("/proc/{}/exe", pid))
            .map(|p| strip_deleted(&p).to_string())
            .unwrap_or_default();

        let (open_files, bitness) = if slow_fields {
            (
                self.source.list_dir(&format!("/proc/{}/fd", pid)).len() as u64,
                self.probe_bitness(&path),
            )
        } else {
            (0, 0)
        };

        let command_line = self
            .source
            .read_text(&format!("/proc/{}/cmdline", pid))
            .replace('\0', " ")
            .trim()
            .to_string();

        Some(ProcessRecord {
            pid,
            parent_pid: stat.parent_pid,
            name: status.get("Name").cloned().unwrap_or_default(),
            path,
            command_line,
            state: ProcessState::from_code(state_code),
            priority: stat.priority,
            thread_count: stat.thread_count,
            start_time_ms,
            up_time_ms: now - start_time_ms,
            user_time_ms: self.host.ticks_to_ms(stat.user_ticks),
            kernel_time_ms: self.host.ticks_to_ms(stat.kernel_ticks),
            virtual_size: stat.virtual_size,
            resident_set_size: stat.rss_pages.saturating_mul(self.host.page_size),
            bytes_read: parse_u64_or(io.get("read_bytes").map_or("", String::as_str), 0),
            bytes_written: parse_u64_or(io.get("write_bytes").map_or("", String::as_str), 0),
            open_files,
            bitness,
            user_id,
            user_name,
            group_id,
            group_name,
            cwd: self
                .source
                .read_link(&format!("/proc/{}/cwd", pid))
                .unwrap_or_default(),
        })
    }

    /// Reads the ELF identification bytes of the executable.
    fn probe_bitness(&self, path: &str) -> u8 {
        if path.is_empty() {
            return 0;
        }
        let ident = self.source.read_prefix(path, 5);
        match ident.get(4) {
            Some(&ELFCLASS32) => 32,
            Some(_) if ident.len() == 5 => 64,
            _ => 0,
        }
    }
}

fn first_token(value: Option<&String>) -> String {
    value
        .and_then(|v| v.split_whitespace().next())
        .unwrap_or_default()
        .to_string()
}

fn strip_deleted(path: &str) -> &str {
    match path.find(DELETED_SUFFIX) {
        Some(idx) => &path[..idx],
        None => path,
    }
}
