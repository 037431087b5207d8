//! Integration tests for tick normalization and the `/proc/stat` reader.

use std::fs;

use ahash::AHashMap as HashMap;
use herakles_host_telemetry::source::FsSource;
use herakles_host_telemetry::ticks::{normalize, RawTicks, TickReader, TickSnapshot, TickType, TickUnit};
use herakles_host_telemetry::topology::build_legacy;
use proptest::prelude::*;
use tempfile::tempdir;

const PROC_STAT: &str = "\
cpu  400 20 300 9000 50 10 5 0 0 0
cpu0 200 10 150 4500 25 5 3 0 0 0
cpu1 200 10 150 4500 25 5 2 0 0 0
intr 12345 0 0
ctxt 67890
btime 1600000000
";

fn stat_row(values: [i64; 7]) -> HashMap<String, i64> {
    ["user", "nice", "system", "idle", "iowait", "irq", "softirq"]
        .iter()
        .zip(values)
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

proptest! {
    #[test]
    fn system_excludes_interrupt_time(
        irq in 0u64..1_000_000,
        softirq in 0u64..1_000_000,
        extra in 0u64..1_000_000,
    ) {
        let raw = RawTicks {
            privileged: irq + softirq + extra,
            irq,
            softirq,
            ..RawTicks::default()
        };
        let ticks = normalize(&raw, TickUnit::Millis);
        prop_assert_eq!(
            ticks[TickType::System] + ticks[TickType::Irq] + ticks[TickType::Softirq],
            raw.privileged
        );
        prop_assert_eq!(ticks[TickType::System], extra);
    }

    #[test]
    fn proc_stat_system_matches_kernel_column(values in prop::array::uniform7(0i64..10_000_000)) {
        let raw = RawTicks::from_proc_stat_row(&stat_row(values));
        let ticks = normalize(&raw, TickUnit::Jiffies { per_second: 100 });
        prop_assert_eq!(ticks[TickType::User], values[0] as u64 * 10);
        prop_assert_eq!(ticks[TickType::Nice], values[1] as u64 * 10);
        prop_assert_eq!(ticks[TickType::System], values[2] as u64 * 10);
        prop_assert_eq!(ticks[TickType::Softirq], values[6] as u64 * 10);
    }
}

#[test]
fn test_system_and_processor_ticks_from_proc_stat() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("proc")).unwrap();
    fs::write(dir.path().join("proc/stat"), PROC_STAT).unwrap();
    let source = FsSource::with_root(dir.path());
    let reader = TickReader::new(&source, 100);

    let system = reader.system_ticks().unwrap();
    assert_eq!(system[TickType::User], 4_000);
    assert_eq!(system[TickType::System], 3_000);
    assert_eq!(system[TickType::Idle], 90_000);
    assert_eq!(system[TickType::Irq], 100);
    assert_eq!(system[TickType::Softirq], 50);

    let topology = build_legacy(&[0x3], &[0x1, 0x2]);
    let mut per_cpu = Vec::new();
    assert!(reader.refresh_processor_ticks(&topology, &mut per_cpu));
    assert_eq!(per_cpu.len(), 2);
    assert_eq!(per_cpu[1][TickType::Softirq], 20);
    assert_eq!(per_cpu[0].total() + per_cpu[1].total(), system.total());
}

#[test]
fn test_missing_proc_stat_leaves_targets_unchanged() {
    let dir = tempdir().unwrap();
    let source = FsSource::with_root(dir.path());
    let reader = TickReader::new(&source, 100);

    let previous = TickSnapshot::from_array([1, 2, 3, 4, 5, 6, 7]);
    let mut system = previous;
    assert!(!reader.refresh_system_ticks(&mut system));
    assert_eq!(system, previous);

    let topology = build_legacy(&[0x1], &[0x1]);
    let mut per_cpu = vec![previous];
    assert!(!reader.refresh_processor_ticks(&topology, &mut per_cpu));
    assert_eq!(per_cpu, vec![previous]);
}
