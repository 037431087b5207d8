//! Per-processor clock frequencies in Hz, `-1` where unsupported.

use serde::Serialize;
use tracing::debug;

use crate::source::{parse_i64_or, CounterTable, SourceReader};
use crate::ticks::{instance_index, TOTAL_INSTANCE};
use crate::topology::Topology;

/// Frequency value for "not available on this platform".
pub const UNSUPPORTED: i64 = -1;

/// Counter metric: current frequency as a percentage of the maximum.
pub const PERCENT_OF_MAX_METRIC: &str = "PercentofMaximumFrequency";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencySnapshot {
    /// Indexed by dense logical processor index.
    pub current_hz: Vec<i64>,
    pub max_hz: Vec<i64>,
}

impl FrequencySnapshot {
    pub fn unsupported(count: usize) -> Self {
        Self {
            current_hz: vec![UNSUPPORTED; count],
            max_hz: vec![UNSUPPORTED; count],
        }
    }

    /// Highest maximum across processors, or `-1`.
    pub fn max_frequency(&self) -> i64 {
        self.max_hz.iter().copied().max().unwrap_or(UNSUPPORTED)
    }
}

pub fn khz_to_hz(khz: i64) -> i64 {
    if khz < 0 {
        UNSUPPORTED
    } else {
        khz.saturating_mul(1_000)
    }
}

pub fn mhz_to_hz(mhz: i64) -> i64 {
    if mhz < 0 {
        UNSUPPORTED
    } else {
        mhz.saturating_mul(1_000_000)
    }
}

/// `percent * max / 100`, `-1` when either side is unknown.
pub fn percent_of_max(percent: i64, max_hz: i64) -> i64 {
    if percent < 0 || max_hz < 0 {
        UNSUPPORTED
    } else {
        percent.saturating_mul(max_hz) / 100
    }
}

/// Current frequencies from a percent-of-maximum counter table and
/// per-processor maxima.
pub fn frequencies_from_counters(table: &CounterTable, topology: &Topology, max_hz: &[i64]) -> Vec<i64> {
    let mut current = vec![UNSUPPORTED; topology.logical_processor_count()];
    for (label, row) in table {
        if label == TOTAL_INSTANCE {
            continue;
        }
        let (Some(idx), Some(percent)) = (instance_index(label, topology), row.get(PERCENT_OF_MAX_METRIC)) else {
            continue;
        };
        if let Some(slot) = current.get_mut(idx) {
            *slot = percent_of_max(*percent, max_hz.get(idx).copied().unwrap_or(UNSUPPORTED));
        }
    }
    current
}

fn read_khz(source: &dyn SourceReader, processor_number: u32, file: &str) -> i64 {
    let text = source.read_text(&format!(
        "/sys/devices/system/cpu/cpu{}/cpufreq/{}",
        processor_number, file
    ));
    if text.trim().is_empty() {
        return UNSUPPORTED;
    }
    khz_to_hz(parse_i64_or(&text, UNSUPPORTED))
}

/// `cpu MHz` per processor number from `/proc/cpuinfo`.
fn read_cpuinfo_mhz(source: &dyn SourceReader) -> Vec<(u32, i64)> {
    let mut result = Vec::new();
    let mut processor: Option<u32> = None;
    for line in source.read_lines("/proc/cpuinfo") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "processor" => processor = value.trim().parse().ok(),
            "cpu MHz" => {
                if let (Some(p), Ok(mhz)) = (processor, value.trim().parse::<f64>()) {
                    result.push((p, (mhz * 1_000_000.0) as i64));
                }
            }
            _ => {}
        }
    }
    result
}

/// cpufreq scaling and maximum frequencies, with `/proc/cpuinfo` as the
/// fallback for current values.
pub fn read_linux_frequencies(source: &dyn SourceReader, topology: &Topology) -> FrequencySnapshot {
    let mut snapshot = FrequencySnapshot::unsupported(topology.logical_processor_count());
    for (idx, p) in topology.processors().iter().enumerate() {
        snapshot.current_hz[idx] = read_khz(source, p.processor_number, "scaling_cur_freq");
        snapshot.max_hz[idx] = read_khz(source, p.processor_number, "cpuinfo_max_freq");
    }

    if snapshot.current_hz.iter().all(|hz| *hz == UNSUPPORTED) {
        let cpuinfo = read_cpuinfo_mhz(source);
        if cpuinfo.is_empty() {
            debug!("No cpufreq or cpu MHz data, frequencies unsupported");
        }
        for (number, hz) in cpuinfo {
            if let Some(idx) = topology.index_of_processor(number) {
                snapshot.current_hz[idx] = hz;
            }
        }
    }
    snapshot
}
