//! CPU tick normalization.
//!
//! Raw counters come in jiffies (`/proc/stat`), 100 ns units (system times
//! and processor counter tables) or milliseconds. Every field is converted
//! to milliseconds first; SYSTEM is then the privileged time with IRQ and
//! SOFTIRQ taken out so the categories never double count.

pub mod frequency;

use ahash::AHashMap as HashMap;
use serde::Serialize;
use std::ops::Index;
use tracing::{debug, trace};

use crate::source::{CounterTable, SourceReader, PROC_STAT_COUNTERS};
use crate::topology::Topology;

pub use frequency::{FrequencySnapshot, UNSUPPORTED};

/// Per-processor counter category (100 ns units).
pub const PROCESSOR_COUNTERS: &str = "processor_information";
/// Host-wide idle/kernel/user times (100 ns units), instance `_Total`.
pub const SYSTEM_TIMES_COUNTERS: &str = "system_times";
/// Aggregate instance present in counter tables.
pub const TOTAL_INSTANCE: &str = "_Total";

pub const TICK_TYPE_COUNT: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TickType {
    User,
    System,
    Idle,
    Irq,
    Softirq,
    Iowait,
    Nice,
}

impl TickType {
    pub const ALL: [TickType; TICK_TYPE_COUNT] = [
        TickType::User,
        TickType::System,
        TickType::Idle,
        TickType::Irq,
        TickType::Softirq,
        TickType::Iowait,
        TickType::Nice,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Milliseconds per [`TickType`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickSnapshot([u64; TICK_TYPE_COUNT]);

impl TickSnapshot {
    pub fn from_array(ticks: [u64; TICK_TYPE_COUNT]) -> Self {
        Self(ticks)
    }

    pub fn as_array(&self) -> &[u64; TICK_TYPE_COUNT] {
        &self.0
    }

    pub fn get(&self, tick: TickType) -> u64 {
        self.0[tick.index()]
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    /// Busy fraction between two snapshots, 0.0 when nothing elapsed.
    pub fn load_since(&self, previous: &TickSnapshot) -> f64 {
        let total = self.total().saturating_sub(previous.total());
        if total == 0 {
            return 0.0;
        }
        let idle = (self.get(TickType::Idle) + self.get(TickType::Iowait))
            .saturating_sub(previous.get(TickType::Idle) + previous.get(TickType::Iowait));
        1.0 - idle as f64 / total as f64
    }
}

impl Index<TickType> for TickSnapshot {
    type Output = u64;

    fn index(&self, tick: TickType) -> &u64 {
        &self.0[tick.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickUnit {
    Jiffies { per_second: u64 },
    HundredNanos,
    Millis,
}

impl TickUnit {
    pub fn to_ms(self, raw: u64) -> u64 {
        match self {
            TickUnit::Jiffies { per_second } => raw.saturating_mul(1000) / per_second.max(1),
            TickUnit::HundredNanos => raw / 10_000,
            TickUnit::Millis => raw,
        }
    }
}

/// Counters as reported, before unit conversion. `privileged` includes
/// IRQ and SOFTIRQ time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawTicks {
    pub user: u64,
    pub nice: u64,
    pub privileged: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
}

fn metric(row: &HashMap<String, i64>, name: &str) -> u64 {
    row.get(name).copied().unwrap_or(0).max(0) as u64
}

impl RawTicks {
    /// One `cpu*` row of `/proc/stat`. The kernel reports system time
    /// without interrupts, so they are added back into `privileged`.
    pub fn from_proc_stat_row(row: &HashMap<String, i64>) -> Self {
        let irq = metric(row, "irq");
        let softirq = metric(row, "softirq");
        Self {
            user: metric(row, "user"),
            nice: metric(row, "nice"),
            privileged: metric(row, "system").saturating_add(irq).saturating_add(softirq),
            idle: metric(row, "idle"),
            iowait: metric(row, "iowait"),
            irq,
            softirq,
        }
    }

    /// Host-wide idle/kernel/user times; kernel time includes idle.
    pub fn from_system_times(idle: u64, kernel: u64, user: u64) -> Self {
        Self {
            user,
            privileged: kernel.saturating_sub(idle),
            idle,
            ..Self::default()
        }
    }

    /// One instance of a processor counter table.
    pub fn from_counter_row(row: &HashMap<String, i64>) -> Self {
        Self {
            user: metric(row, "PercentUserTime"),
            privileged: metric(row, "PercentPrivilegedTime"),
            idle: metric(row, "PercentProcessorTime"),
            irq: metric(row, "PercentInterruptTime"),
            softirq: metric(row, "PercentDPCTime"),
            ..Self::default()
        }
    }

    fn accumulate(&mut self, other: &RawTicks) {
        self.user = self.user.saturating_add(other.user);
        self.nice = self.nice.saturating_add(other.nice);
        self.privileged = self.privileged.saturating_add(other.privileged);
        self.idle = self.idle.saturating_add(other.idle);
        self.iowait = self.iowait.saturating_add(other.iowait);
        self.irq = self.irq.saturating_add(other.irq);
        self.softirq = self.softirq.saturating_add(other.softirq);
    }
}

/// Converts to milliseconds, then removes IRQ and SOFTIRQ from SYSTEM.
pub fn normalize(raw: &RawTicks, unit: TickUnit) -> TickSnapshot {
    let irq = unit.to_ms(raw.irq);
    let softirq = unit.to_ms(raw.softirq);
    let mut ticks = [0u64; TICK_TYPE_COUNT];
    ticks[TickType::User.index()] = unit.to_ms(raw.user);
    ticks[TickType::System.index()] = unit.to_ms(raw.privileged).saturating_sub(irq + softirq);
    ticks[TickType::Idle.index()] = unit.to_ms(raw.idle);
    ticks[TickType::Irq.index()] = irq;
    ticks[TickType::Softirq.index()] = softirq;
    ticks[TickType::Iowait.index()] = unit.to_ms(raw.iowait);
    ticks[TickType::Nice.index()] = unit.to_ms(raw.nice);
    TickSnapshot(ticks)
}

/// Dense logical index for a counter instance label: a plain processor
/// number (`3`, `cpu3`) or a NUMA-qualified `node,proc`.
pub fn instance_index(label: &str, topology: &Topology) -> Option<usize> {
    if label.contains(',') {
        return topology.index_of_numa_label(label);
    }
    let number = label.strip_prefix("cpu").unwrap_or(label);
    number
        .parse::<u32>()
        .ok()
        .and_then(|n| topology.index_of_processor(n))
}

/// Per-processor raw ticks keyed by dense index. Aggregate and unmapped
/// instances are skipped.
pub fn map_processor_rows(
    table: &CounterTable,
    topology: &Topology,
    adapter: fn(&HashMap<String, i64>) -> RawTicks,
) -> HashMap<usize, RawTicks> {
    let mut mapped = HashMap::with_capacity(table.len());
    for (label, row) in table {
        if label == TOTAL_INSTANCE || label == "cpu" {
            continue;
        }
        match instance_index(label, topology) {
            Some(idx) => {
                mapped.insert(idx, adapter(row));
            }
            None => trace!("Counter instance {} has no logical processor", label),
        }
    }
    mapped
}

/// Reads tick counters through one [`SourceReader`].
pub struct TickReader<'a> {
    source: &'a dyn SourceReader,
    ticks_per_second: u64,
}

impl<'a> TickReader<'a> {
    pub fn new(source: &'a dyn SourceReader, ticks_per_second: u64) -> Self {
        Self {
            source,
            ticks_per_second,
        }
    }

    fn jiffies(&self) -> TickUnit {
        TickUnit::Jiffies {
            per_second: self.ticks_per_second,
        }
    }

    /// Host-wide ticks: the aggregate `/proc/stat` row, else system times
    /// plus summed processor interrupt counters, else the processor sum.
    pub fn system_ticks(&self) -> Option<TickSnapshot> {
        let stat = self.source.query_counters(PROC_STAT_COUNTERS);
        if let Some(row) = stat.get("cpu") {
            return Some(normalize(&RawTicks::from_proc_stat_row(row), self.jiffies()));
        }

        let processors = self.source.query_counters(PROCESSOR_COUNTERS);
        let mut summed = RawTicks::default();
        let mut found = false;
        for (label, row) in &processors {
            if label != TOTAL_INSTANCE {
                summed.accumulate(&RawTicks::from_counter_row(row));
                found = true;
            }
        }

        let times = self.source.query_counters(SYSTEM_TIMES_COUNTERS);
        if let Some(row) = times.get(TOTAL_INSTANCE) {
            let mut raw = RawTicks::from_system_times(
                metric(row, "IdleTime"),
                metric(row, "KernelTime"),
                metric(row, "UserTime"),
            );
            raw.irq = summed.irq;
            raw.softirq = summed.softirq;
            return Some(normalize(&raw, TickUnit::HundredNanos));
        }
        if found {
            return Some(normalize(&summed, TickUnit::HundredNanos));
        }
        debug!("No host-wide tick source available");
        None
    }

    /// Per-processor ticks keyed by dense logical index.
    pub fn processor_ticks(&self, topology: &Topology) -> HashMap<usize, TickSnapshot> {
        let stat = self.source.query_counters(PROC_STAT_COUNTERS);
        let (rows, unit) = if stat.keys().any(|k| k != "cpu") {
            (
                map_processor_rows(&stat, topology, RawTicks::from_proc_stat_row),
                self.jiffies(),
            )
        } else {
            (
                map_processor_rows(
                    &self.source.query_counters(PROCESSOR_COUNTERS),
                    topology,
                    RawTicks::from_counter_row,
                ),
                TickUnit::HundredNanos,
            )
        };
        rows.into_iter()
            .map(|(idx, raw)| (idx, normalize(&raw, unit)))
            .collect()
    }

    /// Overwrites `target` only when a fresh reading exists.
    pub fn refresh_system_ticks(&self, target: &mut TickSnapshot) -> bool {
        match self.system_ticks() {
            Some(ticks) => {
                *target = ticks;
                true
            }
            None => false,
        }
    }

    /// Resizes `target` to the processor count and overwrites the entries
    /// that have a fresh reading; the rest keep their previous values.
    pub fn refresh_processor_ticks(&self, topology: &Topology, target: &mut Vec<TickSnapshot>) -> bool {
        let fresh = self.processor_ticks(topology);
        if fresh.is_empty() {
            return false;
        }
        target.resize(topology.logical_processor_count(), TickSnapshot::default());
        for (idx, ticks) in fresh {
            if let Some(slot) = target.get_mut(idx) {
                *slot = ticks;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use crate::topology::{build_extended, GroupAffinity, RelationKind, RelationshipRecord};

    fn row(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn four_cpus() -> Topology {
        crate::topology::build_legacy(&[0xF], &[0x1, 0x2, 0x4, 0x8])
    }

    #[test]
    fn test_huge_counters_saturate() {
        let raw = RawTicks::from_proc_stat_row(&row(&[
            ("system", i64::MAX),
            ("irq", i64::MAX),
            ("softirq", i64::MAX),
        ]));
        assert_eq!(raw.privileged, u64::MAX);

        let mut summed = raw;
        summed.accumulate(&raw);
        assert_eq!(summed.irq, u64::MAX);
        assert_eq!(summed.privileged, u64::MAX);
    }

    #[test]
    fn test_unit_conversion() {
        assert_eq!(TickUnit::Jiffies { per_second: 100 }.to_ms(250), 2500);
        assert_eq!(TickUnit::Jiffies { per_second: 0 }.to_ms(3), 3000);
        assert_eq!(TickUnit::HundredNanos.to_ms(123_456_789), 12_345);
        assert_eq!(TickUnit::Millis.to_ms(42), 42);
    }

    #[test]
    fn test_proc_stat_row_excludes_interrupts_from_system() {
        let raw = RawTicks::from_proc_stat_row(&row(&[
            ("user", 100),
            ("nice", 5),
            ("system", 50),
            ("idle", 1000),
            ("iowait", 7),
            ("irq", 3),
            ("softirq", 2),
        ]));
        assert_eq!(raw.privileged, 55);
        let ticks = normalize(&raw, TickUnit::Jiffies { per_second: 100 });
        assert_eq!(ticks[TickType::User], 1000);
        assert_eq!(ticks[TickType::System], 500);
        assert_eq!(ticks[TickType::Irq], 30);
        assert_eq!(ticks[TickType::Softirq], 20);
        assert_eq!(ticks[TickType::Nice], 50);
        assert_eq!(ticks[TickType::Iowait], 70);
    }

    #[test]
    fn test_system_times_subtract_idle() {
        let raw = RawTicks::from_system_times(600_000, 1_000_000, 300_000);
        assert_eq!(raw.privileged, 400_000);
        let ticks = normalize(&raw, TickUnit::HundredNanos);
        assert_eq!(ticks[TickType::Idle], 60);
        assert_eq!(ticks[TickType::System], 40);
        assert_eq!(ticks[TickType::User], 30);
    }

    #[test]
    fn test_normalize_saturates() {
        let raw = RawTicks {
            privileged: 1,
            irq: 5,
            softirq: 5,
            ..RawTicks::default()
        };
        assert_eq!(normalize(&raw, TickUnit::Millis)[TickType::System], 0);
    }

    #[test]
    fn test_instance_index() {
        let topo = four_cpus();
        assert_eq!(instance_index("2", &topo), Some(2));
        assert_eq!(instance_index("cpu3", &topo), Some(3));
        assert_eq!(instance_index("0,1", &topo), Some(1));
        assert_eq!(instance_index("1,1", &topo), None);
        assert_eq!(instance_index("9", &topo), None);
        assert_eq!(instance_index("_Total", &topo), None);
    }

    #[test]
    fn test_counter_table_numa_labels() {
        let records = vec![
            RelationshipRecord::new(RelationKind::Core, vec![GroupAffinity::new(0, 0x1)]),
            RelationshipRecord::new(RelationKind::Core, vec![GroupAffinity::new(0, 0x2)]),
            RelationshipRecord::new(
                RelationKind::NumaNode { node: 1 },
                vec![GroupAffinity::new(0, 0x1)],
            ),
            RelationshipRecord::new(
                RelationKind::NumaNode { node: 0 },
                vec![GroupAffinity::new(0, 0x2)],
            ),
        ];
        let topo = build_extended(&records);
        let mut table = CounterTable::new();
        table.insert(
            "1,0".to_string(),
            row(&[("PercentUserTime", 10_000), ("PercentProcessorTime", 20_000)]),
        );
        table.insert("0,1".to_string(), row(&[("PercentUserTime", 30_000)]));
        table.insert("_Total".to_string(), row(&[("PercentUserTime", 40_000)]));
        table.insert("0,_Total".to_string(), row(&[("PercentUserTime", 30_000)]));

        let source = MemorySource::new().with_counters(PROCESSOR_COUNTERS, table);
        let ticks = TickReader::new(&source, 100).processor_ticks(&topo);
        assert_eq!(ticks.len(), 2);
        // Processor 1 sits on node 0 and sorts first.
        assert_eq!(ticks[&0][TickType::User], 3);
        assert_eq!(ticks[&1][TickType::User], 1);
        assert_eq!(ticks[&1][TickType::Idle], 2);
    }

    #[test]
    fn test_system_ticks_from_system_times() {
        let mut processors = CounterTable::new();
        processors.insert(
            "0".to_string(),
            row(&[("PercentInterruptTime", 20_000), ("PercentDPCTime", 10_000)]),
        );
        let mut times = CounterTable::new();
        times.insert(
            TOTAL_INSTANCE.to_string(),
            row(&[("IdleTime", 500_000), ("KernelTime", 900_000), ("UserTime", 100_000)]),
        );
        let source = MemorySource::new()
            .with_counters(PROCESSOR_COUNTERS, processors)
            .with_counters(SYSTEM_TIMES_COUNTERS, times);
        let ticks = TickReader::new(&source, 100).system_ticks().expect("ticks");
        assert_eq!(ticks[TickType::Idle], 50);
        assert_eq!(ticks[TickType::Irq], 2);
        assert_eq!(ticks[TickType::Softirq], 1);
        assert_eq!(ticks[TickType::System], 40 - 3);
    }

    #[test]
    fn test_refresh_leaves_previous_on_failure() {
        let source = MemorySource::new().with_file("/proc/stat", "cpu 1 2\nintr 5\n");
        let reader = TickReader::new(&source, 100);
        let mut snapshot = TickSnapshot::from_array([1, 2, 3, 4, 5, 6, 7]);
        assert!(!reader.refresh_system_ticks(&mut snapshot));
        assert_eq!(snapshot.as_array(), &[1, 2, 3, 4, 5, 6, 7]);

        let mut per_cpu = vec![snapshot; 4];
        assert!(!reader.refresh_processor_ticks(&four_cpus(), &mut per_cpu));
        assert_eq!(per_cpu.len(), 4);
        assert_eq!(per_cpu[0], snapshot);
    }

    #[test]
    fn test_refresh_processor_ticks_partial() {
        let source = MemorySource::new().with_file(
            "/proc/stat",
            "cpu  40 0 20 400 0 0 0 0\ncpu0 10 0 5 100 0 0 0 0\ncpu2 10 0 5 100\n",
        );
        let reader = TickReader::new(&source, 100);
        let mut per_cpu = Vec::new();
        assert!(reader.refresh_processor_ticks(&four_cpus(), &mut per_cpu));
        assert_eq!(per_cpu.len(), 4);
        assert_eq!(per_cpu[0][TickType::User], 100);
        assert_eq!(per_cpu[1], TickSnapshot::default());
        assert_eq!(per_cpu[2][TickType::Idle], 1000);
    }

    #[test]
    fn test_load_since() {
        let a = TickSnapshot::from_array([100, 0, 100, 0, 0, 0, 0]);
        let b = TickSnapshot::from_array([150, 0, 150, 0, 0, 0, 0]);
        assert!((b.load_since(&a) - 0.5).abs() < f64::EPSILON);
        assert_eq!(a.load_since(&a), 0.0);
    }
}
