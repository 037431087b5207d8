//! Host constants detected once at startup.
//!
//! Clock ticks per second, memory page size, boot time and the width of a
//! `/proc/<pid>/stat` line are needed by every process and tick conversion.
//! They are computed once, published through a write-once cell and then
//! passed by value into the builders.

use once_cell::sync::OnceCell;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::process::stat::MAX_STAT_ORDINAL;
use crate::source::{FsSource, SourceReader};

pub const DEFAULT_TICKS_PER_SECOND: u64 = 100;
pub const DEFAULT_PAGE_SIZE: u64 = 4096;
/// Field count of a `/proc/<pid>/stat` line on kernels >= 3.5.
pub const DEFAULT_STAT_WIDTH: usize = 52;

static HOST: OnceCell<HostConstants> = OnceCell::new();

/// Immutable per-boot constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HostConstants {
    pub ticks_per_second: u64,
    pub page_size: u64,
    /// Boot time in milliseconds since the epoch (averaged uptime reads).
    pub boot_time_ms: i64,
    /// Boot time in seconds since the epoch (`btime`).
    pub boot_time_secs: i64,
    pub stat_width: usize,
}

impl Default for HostConstants {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            page_size: DEFAULT_PAGE_SIZE,
            boot_time_ms: 0,
            boot_time_secs: 0,
            stat_width: DEFAULT_STAT_WIDTH,
        }
    }
}

impl HostConstants {
    /// Detects all constants from `source` and the running kernel.
    pub fn detect(source: &dyn SourceReader) -> Self {
        let ticks_per_second = sysconf_or(SysconfName::ClockTicks, DEFAULT_TICKS_PER_SECOND);
        let page_size = sysconf_or(SysconfName::PageSize, DEFAULT_PAGE_SIZE);
        let boot_time_ms = detect_boot_time_ms(source);
        let boot_time_secs = detect_boot_time_secs(source);
        let stat_width = detect_stat_width(&source.read_text("/proc/self/stat"));

        let constants = Self {
            ticks_per_second,
            page_size,
            boot_time_ms,
            boot_time_secs,
            stat_width,
        };
        debug!("Host constants detected: {:?}", constants);
        constants
    }

    /// Process-wide constants for the live filesystem, detected on first use.
    pub fn global() -> &'static HostConstants {
        HOST.get_or_init(|| Self::detect(&FsSource::default()))
    }

    pub fn ticks_to_ms(&self, ticks: u64) -> u64 {
        ticks.saturating_mul(1000) / self.ticks_per_second.max(1)
    }

    pub fn ms_to_ticks(&self, ms: u64) -> u64 {
        ms.saturating_mul(self.ticks_per_second) / 1000
    }
}

/// Milliseconds since the epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// First field of `/proc/uptime`, in seconds.
pub fn read_uptime_secs(source: &dyn SourceReader) -> Option<f64> {
    source
        .read_text("/proc/uptime")
        .split_whitespace()
        .next()
        .and_then(|v| v.parse::<f64>().ok())
}

/// `btime` line of `/proc/stat`.
pub fn read_btime(source: &dyn SourceReader) -> Option<i64> {
    source
        .read_lines("/proc/stat")
        .iter()
        .find_map(|l| l.strip_prefix("btime "))
        .and_then(|v| v.trim().parse().ok())
}

/// Counts the fields of a stat line: the tokens after the closing
/// parenthesis of the name, plus pid and name.
pub fn detect_stat_width(stat: &str) -> usize {
    match stat.rfind(')') {
        Some(idx) => {
            let width = stat[idx + 1..].split_whitespace().count() + 2;
            width.max(MAX_STAT_ORDINAL)
        }
        None => {
            warn!(
                "Unable to detect /proc/<pid>/stat width, assuming {}",
                DEFAULT_STAT_WIDTH
            );
            DEFAULT_STAT_WIDTH
        }
    }
}

fn detect_boot_time_ms(source: &dyn SourceReader) -> i64 {
    // /proc/uptime has 10ms resolution; two reads around "now" halve the error.
    let first = read_uptime_secs(source);
    let now = now_ms();
    let second = read_uptime_secs(source);
    match (first, second) {
        (Some(a), Some(b)) => now - (500.0 * (a + b) + 0.5) as i64,
        _ => match read_btime(source) {
            Some(btime) => btime * 1000,
            None => {
                warn!("Unable to determine boot time, using current time");
                now
            }
        },
    }
}

fn detect_boot_time_secs(source: &dyn SourceReader) -> i64 {
    read_btime(source).unwrap_or_else(|| {
        let uptime = read_uptime_secs(source).unwrap_or(0.0);
        now_ms() / 1000 - uptime as i64
    })
}

enum SysconfName {
    ClockTicks,
    PageSize,
}

fn sysconf_or(name: SysconfName, default: u64) -> u64 {
    #[cfg(unix)]
    {
        let key = match name {
            SysconfName::ClockTicks => libc::_SC_CLK_TCK,
            SysconfName::PageSize => libc::_SC_PAGESIZE,
        };
        // SAFETY: sysconf has no preconditions; -1 and 0 are handled by the > 0 check
        let value = unsafe { libc::sysconf(key) };
        if value > 0 {
            return value as u64;
        }
    }
    #[cfg(not(unix))]
    let _ = name;
    default
}
