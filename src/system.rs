//! System-wide counters: load average, context switches, interrupts and
//! task totals.
//!
//! Parsers return [`crate::error::Result`]; the platform layer turns
//! failures into the documented sentinels.

use serde::Serialize;

use crate::error::{Result, TelemetryError};
use crate::source::SourceReader;

/// System load averages for 1, 5, and 15 minute intervals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadAverage {
    pub one_min: f64,
    pub five_min: f64,
    pub fifteen_min: f64,
}

impl LoadAverage {
    /// All three values at `-1`.
    pub fn unsupported() -> Self {
        Self {
            one_min: -1.0,
            five_min: -1.0,
            fifteen_min: -1.0,
        }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.one_min, self.five_min, self.fifteen_min]
    }
}

/// Content of `path`, or an `Io` error when the source is absent.
fn read_present(source: &dyn SourceReader, path: &str) -> Result<String> {
    if !source.exists(path) {
        return Err(TelemetryError::missing(path));
    }
    Ok(source.read_text(path))
}

/// Reads load average from /proc/loadavg.
///
/// Format: "0.00 0.01 0.05 1/234 5678"
pub fn read_load_average(source: &dyn SourceReader) -> Result<LoadAverage> {
    let content = read_present(source, "/proc/loadavg")?;
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(TelemetryError::malformed(
            "/proc/loadavg",
            format!("expected at least 3 fields, got {}", parts.len()),
        ));
    }

    let parse = |idx: usize| {
        parts[idx]
            .parse::<f64>()
            .map_err(|e| TelemetryError::malformed("/proc/loadavg", format!("field {}: {}", idx + 1, e)))
    };

    Ok(LoadAverage {
        one_min: parse(0)?,
        five_min: parse(1)?,
        fifteen_min: parse(2)?,
    })
}

/// Total scheduling entities, the denominator of the 4th `/proc/loadavg`
/// field.
pub fn read_thread_count(source: &dyn SourceReader) -> Result<u64> {
    let content = read_present(source, "/proc/loadavg")?;
    let field = content
        .split_whitespace()
        .nth(3)
        .ok_or_else(|| TelemetryError::malformed("/proc/loadavg", "missing running/total field"))?;
    let (_, total) = field
        .split_once('/')
        .ok_or_else(|| TelemetryError::malformed("/proc/loadavg", format!("bad task field {:?}", field)))?;
    total
        .parse()
        .map_err(|e| TelemetryError::malformed("/proc/loadavg", format!("bad task total: {}", e)))
}

/// Context switch and interrupt totals since boot (`ctxt`, first `intr`
/// value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatCounters {
    pub context_switches: u64,
    pub interrupts: u64,
}

/// Reads `ctxt` and `intr` from /proc/stat.
pub fn read_stat_counters(source: &dyn SourceReader) -> Result<StatCounters> {
    let mut context_switches: Option<u64> = None;
    let mut interrupts: Option<u64> = None;

    for line in read_present(source, "/proc/stat")?.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        match key {
            "ctxt" => context_switches = value.parse().ok(),
            "intr" => interrupts = value.parse().ok(),
            _ => {}
        }
        if context_switches.is_some() && interrupts.is_some() {
            break;
        }
    }

    match (context_switches, interrupts) {
        (Some(context_switches), Some(interrupts)) => Ok(StatCounters {
            context_switches,
            interrupts,
        }),
        _ => Err(TelemetryError::malformed("/proc/stat", "missing ctxt or intr line")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn test_read_load_average() {
        let source = MemorySource::new().with_file("/proc/loadavg", "0.50 1.25 2.00 3/456 7890\n");
        let load = read_load_average(&source).unwrap();
        assert_eq!(load.as_array(), [0.5, 1.25, 2.0]);
        assert_eq!(read_thread_count(&source).unwrap(), 456);
    }

    #[test]
    fn test_load_average_missing() {
        let source = MemorySource::new();
        assert!(matches!(read_load_average(&source), Err(TelemetryError::Io { .. })));
        assert!(matches!(read_thread_count(&source), Err(TelemetryError::Io { .. })));
        assert!(matches!(read_stat_counters(&source), Err(TelemetryError::Io { .. })));
        assert_eq!(LoadAverage::unsupported().as_array(), [-1.0; 3]);
    }

    #[test]
    fn test_load_average_malformed() {
        let source = MemorySource::new().with_file("/proc/loadavg", "0.5 abc 1.0 1\n");
        assert!(matches!(read_load_average(&source), Err(TelemetryError::Malformed { .. })));
        assert!(matches!(read_thread_count(&source), Err(TelemetryError::Malformed { .. })));
    }

    #[test]
    fn test_read_stat_counters() {
        let source = MemorySource::new().with_file(
            "/proc/stat",
            "cpu  1 2 3 4\nintr 12345 0 1 2\nctxt 67890\nbtime 1700000000\n",
        );
        let counters = read_stat_counters(&source).unwrap();
        assert_eq!(counters.context_switches, 67890);
        assert_eq!(counters.interrupts, 12345);
    }

    #[test]
    fn test_stat_counters_missing() {
        let source = MemorySource::new().with_file("/proc/stat", "cpu  1 2 3 4\n");
        assert!(matches!(read_stat_counters(&source), Err(TelemetryError::Malformed { .. })));
    }
}
