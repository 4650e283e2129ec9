//! # Capacity Domains
//!
//! Groups of CPUs sharing one capacity class, ordered slowest to fastest.
//! Only static topology lives here; governor state is kept by `ecs`.

use crate::config::DomainSpec;
use crate::cpumask::CpuMask;
use crate::CpuId;
use alloc::vec::Vec;

/// One capacity domain
#[derive(Debug, Clone)]
pub struct Domain {
    /// Position in the slow→fast chain
    index: usize,
    /// Member CPUs
    cpus: CpuMask,
    /// Original capacity of member CPUs
    capacity: u32,
    /// Per-CPU busy threshold on the active ratio
    busy_ratio: u32,
    /// Idle exit latency of member CPUs
    exit_latency_ns: u32,
    /// CPUs the governor never closes
    min_open: usize,
}

impl Domain {
    fn from_spec(index: usize, spec: &DomainSpec) -> Self {
        Self {
            index,
            cpus: spec.cpus,
            capacity: spec.capacity,
            busy_ratio: spec.busy_ratio,
            exit_latency_ns: spec.exit_latency_ns,
            min_open: spec.min_open,
        }
    }

    /// Position in the chain (0 = slowest)
    pub fn index(&self) -> usize {
        self.index
    }

    /// Member CPUs
    pub fn cpus(&self) -> CpuMask {
        self.cpus
    }

    /// Number of member CPUs
    pub fn nr_cpus(&self) -> usize {
        self.cpus.count()
    }

    /// Capacity class
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Sum of member capacities
    pub fn capacity_sum(&self) -> u32 {
        self.capacity * self.nr_cpus() as u32
    }

    /// Busy threshold
    pub fn busy_ratio(&self) -> u32 {
        self.busy_ratio
    }

    /// Idle exit latency
    pub fn exit_latency_ns(&self) -> u32 {
        self.exit_latency_ns
    }

    /// Minimum open CPUs
    pub fn min_open(&self) -> usize {
        self.min_open
    }
}

/// The ordered domain chain
#[derive(Debug, Clone)]
pub struct DomainSet {
    domains: Vec<Domain>,
}

impl DomainSet {
    /// Build from a validated topology
    pub fn new(topology: &[DomainSpec]) -> Self {
        Self {
            domains: topology
                .iter()
                .enumerate()
                .map(|(i, spec)| Domain::from_spec(i, spec))
                .collect(),
        }
    }

    /// Domain by index
    pub fn get(&self, index: usize) -> Option<&Domain> {
        self.domains.get(index)
    }

    /// Domain owning a CPU
    pub fn of_cpu(&self, cpu: CpuId) -> Option<&Domain> {
        self.domains.iter().find(|d| d.cpus.contains(cpu))
    }

    /// Slowest domain
    pub fn slowest(&self) -> Option<&Domain> {
        self.domains.first()
    }

    /// Fastest domain
    pub fn fastest(&self) -> Option<&Domain> {
        self.domains.last()
    }

    /// Is `index` the fastest domain?
    pub fn is_fastest(&self, index: usize) -> bool {
        index + 1 == self.domains.len()
    }

    /// Number of domains
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// No domains
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Domains slowest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Domain> {
        self.domains.iter()
    }
}
