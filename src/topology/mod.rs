//! Processor topology: package, core, logical processor and NUMA node.
//!
//! Two reconstruction algorithms are provided:
//! - [`build_legacy`] works from flat 64-bit package and core masks.
//! - [`build_extended`] works from tagged relationship records carrying
//!   `(group, mask)` affinities, where the group extends processor numbers
//!   past 64.
//!
//! Both emit one [`LogicalProcessor`] per set bit of the core masks. Bits
//! without a matching package or NUMA record get id 0.

pub mod sysfs;

use ahash::AHashMap as HashMap;
use serde::Serialize;
use tracing::debug;

pub use sysfs::{parse_cpu_mask, read_topology};

/// Processors per affinity group.
pub const GROUP_SIZE: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LogicalProcessor {
    pub processor_number: u32,
    pub core_id: u32,
    pub package_id: u32,
    pub numa_node: u32,
    /// Affinity group, 0 where the platform has none.
    pub group: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GroupAffinity {
    pub group: u16,
    pub mask: u64,
}

impl GroupAffinity {
    pub fn new(group: u16, mask: u64) -> Self {
        Self { group, mask }
    }

    /// Set bit positions, ascending.
    pub fn bits(&self) -> impl Iterator<Item = u32> {
        set_bits(self.mask)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Package,
    Core,
    NumaNode { node: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipRecord {
    pub kind: RelationKind,
    pub affinity: Vec<GroupAffinity>,
}

impl RelationshipRecord {
    pub fn new(kind: RelationKind, affinity: Vec<GroupAffinity>) -> Self {
        Self { kind, affinity }
    }

    /// Ordering key: the first `(group, mask)` pair.
    fn sort_key(&self) -> (u16, u64) {
        self.affinity
            .first()
            .map_or((u16::MAX, u64::MAX), |a| (a.group, a.mask))
    }
}

/// Set bit positions of `mask`, ascending.
pub fn set_bits(mask: u64) -> impl Iterator<Item = u32> {
    (0..GROUP_SIZE).filter(move |bit| mask & (1u64 << bit) != 0)
}

/// `(group, bit)` to the position of the first record covering it.
fn index_by_bit<'a>(records: impl Iterator<Item = &'a [GroupAffinity]>) -> HashMap<(u16, u32), usize> {
    let mut index = HashMap::new();
    for (idx, affinity) in records.enumerate() {
        for a in affinity {
            for bit in a.bits() {
                index.entry((a.group, bit)).or_insert(idx);
            }
        }
    }
    index
}

/// Reconstructs processors from flat package and core masks. Masks are
/// numbered in ascending integer order.
pub fn build_legacy(package_masks: &[u64], core_masks: &[u64]) -> Topology {
    let mut packages = package_masks.to_vec();
    packages.sort_unstable();
    let mut cores = core_masks.to_vec();
    cores.sort_unstable();

    let package_affinity: Vec<[GroupAffinity; 1]> =
        packages.iter().map(|m| [GroupAffinity::new(0, *m)]).collect();
    let package_index = index_by_bit(package_affinity.iter().map(|a| a.as_slice()));

    let mut processors = Vec::new();
    for (core_id, core) in cores.iter().enumerate() {
        for bit in set_bits(*core) {
            processors.push(LogicalProcessor {
                processor_number: bit,
                core_id: core_id as u32,
                package_id: package_index.get(&(0, bit)).copied().unwrap_or(0) as u32,
                numa_node: 0,
                group: 0,
            });
        }
    }
    Topology::new(processors, cores.len(), packages.len(), 1)
}

/// Reconstructs processors from package, core and NUMA relationship
/// records. Packages and cores are numbered in `(group, mask)` order.
pub fn build_extended(records: &[RelationshipRecord]) -> Topology {
    let mut packages: Vec<&RelationshipRecord> = records
        .iter()
        .filter(|r| r.kind == RelationKind::Package)
        .collect();
    packages.sort_by_key(|r| r.sort_key());
    let mut cores: Vec<&RelationshipRecord> = records
        .iter()
        .filter(|r| r.kind == RelationKind::Core)
        .collect();
    cores.sort_by_key(|r| r.sort_key());
    let numa_nodes: Vec<(u32, &RelationshipRecord)> = records
        .iter()
        .filter_map(|r| match r.kind {
            RelationKind::NumaNode { node } => Some((node, r)),
            _ => None,
        })
        .collect();

    let package_index = index_by_bit(packages.iter().map(|r| r.affinity.as_slice()));
    let numa_index = index_by_bit(numa_nodes.iter().map(|(_, r)| r.affinity.as_slice()));

    let mut processors = Vec::new();
    for (core_id, core) in cores.iter().enumerate() {
        for a in &core.affinity {
            for bit in a.bits() {
                let key = (a.group, bit);
                processors.push(LogicalProcessor {
                    processor_number: u32::from(a.group) * GROUP_SIZE + bit,
                    core_id: core_id as u32,
                    package_id: package_index.get(&key).copied().unwrap_or(0) as u32,
                    numa_node: numa_index
                        .get(&key)
                        .map(|idx| numa_nodes[*idx].0)
                        .unwrap_or(0),
                    group: a.group,
                });
            }
        }
    }
    Topology::new(processors, cores.len(), packages.len(), numa_nodes.len().max(1))
}

/// Immutable processor topology snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Topology {
    /// Ordered by `(numa_node, processor_number)`; position is the dense
    /// logical index used by all per-processor arrays.
    processors: Vec<LogicalProcessor>,
    physical_core_count: usize,
    package_count: usize,
    numa_node_count: usize,
    #[serde(skip)]
    numa_lookup: HashMap<String, usize>,
    #[serde(skip)]
    number_lookup: HashMap<u32, usize>,
}

impl Topology {
    pub fn new(
        mut processors: Vec<LogicalProcessor>,
        physical_core_count: usize,
        package_count: usize,
        numa_node_count: usize,
    ) -> Self {
        processors.sort_by_key(|p| p.processor_number);
        let before = processors.len();
        processors.dedup_by_key(|p| p.processor_number);
        if processors.len() != before {
            debug!(
                "Dropped {} processors claimed by more than one core",
                before - processors.len()
            );
        }
        processors.sort_by_key(|p| (p.numa_node, p.processor_number));

        let mut numa_lookup = HashMap::with_capacity(processors.len());
        let mut number_lookup = HashMap::with_capacity(processors.len());
        for (idx, p) in processors.iter().enumerate() {
            numa_lookup.insert(numa_label(p.numa_node, p.processor_number), idx);
            number_lookup.insert(p.processor_number, idx);
        }

        Self {
            processors,
            physical_core_count,
            package_count,
            numa_node_count,
            numa_lookup,
            number_lookup,
        }
    }

    /// One processor on one core, package and node.
    pub fn single() -> Self {
        Self::new(
            vec![LogicalProcessor {
                processor_number: 0,
                core_id: 0,
                package_id: 0,
                numa_node: 0,
                group: 0,
            }],
            1,
            1,
            1,
        )
    }

    pub fn processors(&self) -> &[LogicalProcessor] {
        &self.processors
    }

    /// Distinct processor numbers. A bit claimed by overlapping core masks
    /// counts once and keeps the lowest-numbered core.
    pub fn logical_processor_count(&self) -> usize {
        self.processors.len()
    }

    pub fn physical_core_count(&self) -> usize {
        self.physical_core_count
    }

    pub fn package_count(&self) -> usize {
        self.package_count
    }

    pub fn numa_node_count(&self) -> usize {
        self.numa_node_count
    }

    /// Dense index for a `"numaNode,processorNumber"` counter label.
    pub fn index_of_numa_label(&self, label: &str) -> Option<usize> {
        self.numa_lookup.get(label).copied()
    }

    /// Dense index for a global processor number.
    pub fn index_of_processor(&self, processor_number: u32) -> Option<usize> {
        self.number_lookup.get(&processor_number).copied()
    }
}

pub fn numa_label(numa_node: u32, processor_number: u32) -> String {
    format!("{},{}", numa_node, processor_number)
}
