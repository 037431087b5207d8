//! Linux topology acquisition.
//!
//! Primary source is sysfs: every `cpuN/topology/thread_siblings` mask is a
//! core, every `core_siblings` mask a package and every `nodeN/cpumap` a
//! NUMA node. Without sysfs the flat masks are rebuilt from `/proc/cpuinfo`.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use tracing::{debug, warn};

use super::{build_extended, build_legacy, GroupAffinity, RelationKind, RelationshipRecord, Topology, GROUP_SIZE};
use crate::source::SourceReader;

const CPU_DIR: &str = "/sys/devices/system/cpu";
const NODE_DIR: &str = "/sys/devices/system/node";

/// Parses a sysfs cpumask (`00000000,0000000f`): comma-separated 32-bit hex
/// words, most significant first. Returns one affinity per non-empty group,
/// or an empty list when any word is not hex.
pub fn parse_cpu_mask(text: &str) -> Vec<GroupAffinity> {
    let mut groups: HashMap<u16, u64> = HashMap::new();
    for (i, word) in text.trim().split(',').rev().enumerate() {
        let Ok(value) = u32::from_str_radix(word.trim(), 16) else {
            return Vec::new();
        };
        if value == 0 {
            continue;
        }
        let group = (i / 2) as u16;
        let shift = (i % 2) * 32;
        *groups.entry(group).or_insert(0) |= u64::from(value) << shift;
    }
    let mut affinity: Vec<GroupAffinity> = groups
        .into_iter()
        .map(|(group, mask)| GroupAffinity::new(group, mask))
        .collect();
    affinity.sort();
    affinity
}

/// Numeric suffixes of `<prefix>N` entries in `dir`, ascending.
fn numbered_entries(source: &dyn SourceReader, dir: &str, prefix: &str) -> Vec<u32> {
    let mut ids: Vec<u32> = source
        .list_dir(dir)
        .iter()
        .filter_map(|name| name.strip_prefix(prefix))
        .filter_map(|n| n.parse().ok())
        .collect();
    ids.sort_unstable();
    ids
}

/// Relationship records from sysfs; empty when sysfs is not available.
pub fn read_sysfs_relationships(source: &dyn SourceReader) -> Vec<RelationshipRecord> {
    let mut seen_cores: HashSet<Vec<GroupAffinity>> = HashSet::new();
    let mut seen_packages: HashSet<Vec<GroupAffinity>> = HashSet::new();
    let mut records = Vec::new();

    for cpu in numbered_entries(source, CPU_DIR, "cpu") {
        let base = format!("{}/cpu{}/topology", CPU_DIR, cpu);
        let core = parse_cpu_mask(&source.read_text(&format!("{}/thread_siblings", base)));
        if core.is_empty() {
            // Offline processors have no topology directory.
            debug!("cpu{} has no readable thread_siblings, skipping", cpu);
            continue;
        }
        let package = parse_cpu_mask(&source.read_text(&format!("{}/core_siblings", base)));
        if seen_cores.insert(core.clone()) {
            records.push(RelationshipRecord::new(RelationKind::Core, core));
        }
        if !package.is_empty() && seen_packages.insert(package.clone()) {
            records.push(RelationshipRecord::new(RelationKind::Package, package));
        }
    }

    if records.is_empty() {
        return records;
    }

    for node in numbered_entries(source, NODE_DIR, "node") {
        let mask = parse_cpu_mask(&source.read_text(&format!("{}/node{}/cpumap", NODE_DIR, node)));
        if !mask.is_empty() {
            records.push(RelationshipRecord::new(RelationKind::NumaNode { node }, mask));
        }
    }
    records
}

/// Flat package and core masks from `/proc/cpuinfo`; processors past the
/// first 64 cannot be expressed and are skipped.
pub fn read_cpuinfo_masks(source: &dyn SourceReader) -> Option<(Vec<u64>, Vec<u64>)> {
    let mut packages: HashMap<String, u64> = HashMap::new();
    let mut cores: HashMap<(String, String), u64> = HashMap::new();
    let mut processor: Option<u32> = None;
    let mut physical_id = String::new();
    let mut core_id = String::new();

    let mut flush = |processor: Option<u32>, physical_id: &str, core_id: &str| {
        let Some(p) = processor else {
            return;
        };
        if p >= GROUP_SIZE {
            debug!("Processor {} beyond the first group, skipping", p);
            return;
        }
        let bit = 1u64 << p;
        *packages.entry(physical_id.to_string()).or_insert(0) |= bit;
        // Without a core id every processor is its own core.
        let core_key = if core_id.is_empty() {
            p.to_string()
        } else {
            core_id.to_string()
        };
        *cores
            .entry((physical_id.to_string(), core_key))
            .or_insert(0) |= bit;
    };

    for line in source.read_lines("/proc/cpuinfo") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "processor" => {
                flush(processor, &physical_id, &core_id);
                processor = value.parse().ok();
                physical_id.clear();
                core_id.clear();
            }
            "physical id" => physical_id = value.to_string(),
            "core id" => core_id = value.to_string(),
            _ => {}
        }
    }
    flush(processor, &physical_id, &core_id);

    if cores.is_empty() {
        return None;
    }
    Some((
        packages.into_values().collect(),
        cores.into_values().collect(),
    ))
}

/// Topology of the host behind `source`: sysfs relationships, then
/// `/proc/cpuinfo` masks, then a single processor.
pub fn read_topology(source: &dyn SourceReader) -> Topology {
    let records = read_sysfs_relationships(source);
    if !records.is_empty() {
        let topology = build_extended(&records);
        debug!(
            "Topology from sysfs: {} logical, {} cores, {} packages, {} NUMA nodes",
            topology.logical_processor_count(),
            topology.physical_core_count(),
            topology.package_count(),
            topology.numa_node_count()
        );
        return topology;
    }
    if let Some((packages, cores)) = read_cpuinfo_masks(source) {
        let topology = build_legacy(&packages, &cores);
        debug!(
            "Topology from /proc/cpuinfo: {} logical processors",
            topology.logical_processor_count()
        );
        return topology;
    }
    warn!("No topology source available, assuming a single logical processor");
    Topology::single()
}
