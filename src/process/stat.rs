//! `/proc/<pid>/stat` parsing.
//!
//! Only the numeric fields are taken from the stat line; name and state come
//! from `/proc/<pid>/status`. Fields are addressed after the closing
//! parenthesis of the command name so names containing spaces or parentheses
//! cannot shift the layout.

use crate::error::{Result, TelemetryError};

/// 1-based positions of the parsed fields, see proc(5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatField {
    ParentPid = 4,
    UserTime = 14,
    KernelTime = 15,
    Priority = 18,
    ThreadCount = 20,
    StartTime = 22,
    VirtualSize = 23,
    ResidentSetSize = 24,
}

/// Highest ordinal parsed; a stat line must have at least this many fields.
pub const MAX_STAT_ORDINAL: usize = StatField::ResidentSetSize as usize;

impl StatField {
    /// Index into the tokens that follow the `)` of the name
    /// (ordinal 3, the state, is index 0).
    fn index_after_name(self) -> usize {
        self as usize - 3
    }
}

/// Numeric content of one stat line, still in kernel units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatLine {
    pub parent_pid: u32,
    pub user_ticks: u64,
    pub kernel_ticks: u64,
    pub priority: i64,
    pub thread_count: u64,
    pub start_ticks: u64,
    pub virtual_size: u64,
    pub rss_pages: u64,
}

fn tokens_after_name(stat: &str) -> Result<Vec<&str>> {
    let idx = stat
        .rfind(')')
        .ok_or_else(|| TelemetryError::malformed("stat line", "missing ')'"))?;
    Ok(stat[idx + 1..].split_whitespace().collect())
}

fn field<T: std::str::FromStr>(tokens: &[&str], f: StatField) -> Result<T> {
    let raw = tokens
        .get(f.index_after_name())
        .ok_or_else(|| TelemetryError::malformed("stat line", format!("missing {:?}", f)))?;
    raw.parse::<T>()
        .map_err(|_| TelemetryError::malformed("stat line", format!("{:?} = {:?}", f, raw)))
}

/// Parses a stat line whose field count must reach `width`.
pub fn parse_stat_line(stat: &str, width: usize) -> Result<StatLine> {
    let tokens = tokens_after_name(stat)?;
    let total = tokens.len() + 2;
    if total < width.max(MAX_STAT_ORDINAL) {
        return Err(TelemetryError::malformed(
            "stat line",
            format!("{} fields, expected {}", total, width),
        ));
    }

    Ok(StatLine {
        parent_pid: field(&tokens, StatField::ParentPid)?,
        user_ticks: field(&tokens, StatField::UserTime)?,
        kernel_ticks: field(&tokens, StatField::KernelTime)?,
        priority: field(&tokens, StatField::Priority)?,
        thread_count: field(&tokens, StatField::ThreadCount)?,
        start_ticks: field(&tokens, StatField::StartTime)?,
        virtual_size: field(&tokens, StatField::VirtualSize)?,
        rss_pages: field(&tokens, StatField::ResidentSetSize)?,
    })
}

/// Parent pid only, for child-process filtering.
pub fn parse_parent_pid(stat: &str) -> Option<u32> {
    let tokens = tokens_after_name(stat).ok()?;
    field(&tokens, StatField::ParentPid).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    // pid (comm) state ppid pgrp session tty_nr tpgid flags minflt cminflt majflt cmajflt
    // utime stime cutime cstime priority nice num_threads itrealvalue starttime vsize rss ...
    const STAT: &str = "1234 (test process) S 1 1234 1234 0 -1 4194304 100 0 0 0 1000 500 0 0 20 0 3 0 12345 12345678 1234 18446744073709551615 4194304 4238788 140736466511168 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0 0 0 0 0 0 0 0 0";

    #[test]
    fn test_parse_stat_line() {
        let line = parse_stat_line(STAT, 52).expect("valid stat line");
        assert_eq!(line.parent_pid, 1);
        assert_eq!(line.user_ticks, 1000);
        assert_eq!(line.kernel_ticks, 500);
        assert_eq!(line.priority, 20);
        assert_eq!(line.thread_count, 3);
        assert_eq!(line.start_ticks, 12345);
        assert_eq!(line.virtual_size, 12345678);
        assert_eq!(line.rss_pages, 1234);
    }

    #[test]
    fn test_parse_stat_line_too_short_for_width() {
        assert!(parse_stat_line(STAT, 60).is_err());
        assert!(parse_stat_line("1234 (test) S 1 2 3", 24).is_err());
    }

    #[test]
    fn test_parse_stat_line_non_numeric() {
        let bad = STAT.replace(" 1000 500 ", " abc 500 ");
        assert!(parse_stat_line(&bad, 52).is_err());
    }

    #[test]
    fn test_parse_stat_line_name_with_parentheses() {
        let tricky = STAT.replace("(test process)", "(evil) 9 9 (name)");
        let line = parse_stat_line(&tricky, 52).expect("valid stat line");
        assert_eq!(line.parent_pid, 1);
        assert_eq!(line.rss_pages, 1234);
    }

    #[test]
    fn test_parse_parent_pid() {
        assert_eq!(parse_parent_pid(STAT), Some(1));
        assert_eq!(parse_parent_pid(""), None);
    }
}
