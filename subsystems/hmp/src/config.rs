//! # HMP Configuration
//!
//! Static topology and tuning values. Parsing these from a device tree or a
//! key/value surface is the host's job; this module only holds and checks
//! them.

use crate::cpumask::CpuMask;
use crate::mlt::MLT_PERIOD_COUNT;
use crate::sysbusy::{SysbusyParams, NUM_SYSBUSY_STATES};
use crate::{HmpError, HmpResult, MAX_CPUS, NSEC_PER_MSEC, SCHED_CAPACITY_SCALE};
use alloc::vec;
use alloc::vec::Vec;

/// One capacity domain of the topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSpec {
    /// Member CPUs
    pub cpus: CpuMask,
    /// Original capacity of every member CPU (0..=1024)
    pub capacity: u32,
    /// Per-CPU active ratio above which a CPU counts as busy (0..=1024)
    pub busy_ratio: u32,
    /// Idle-state exit latency of member CPUs (nanoseconds)
    pub exit_latency_ns: u32,
    /// Number of CPUs the governor always keeps open
    pub min_open: usize,
}

impl DomainSpec {
    /// Default busy ratio: 80% active
    pub const DEFAULT_BUSY_RATIO: u32 = 819;

    /// Create a domain with default thresholds
    pub fn new(cpus: CpuMask, capacity: u32) -> Self {
        Self {
            cpus,
            capacity,
            busy_ratio: Self::DEFAULT_BUSY_RATIO,
            exit_latency_ns: 0,
            min_open: 0,
        }
    }

    /// Set the busy ratio
    pub fn with_busy_ratio(mut self, busy_ratio: u32) -> Self {
        self.busy_ratio = busy_ratio;
        self
    }

    /// Set the idle exit latency
    pub fn with_exit_latency(mut self, exit_latency_ns: u32) -> Self {
        self.exit_latency_ns = exit_latency_ns;
        self
    }

    /// Set the minimum open CPU count
    pub fn with_min_open(mut self, min_open: usize) -> Self {
        self.min_open = min_open;
        self
    }
}

/// Load Tracker configuration
#[derive(Debug, Clone)]
pub struct MltConfig {
    /// Period size (nanoseconds)
    pub period_ns: u64,
    /// Number of periods averaged by default queries
    pub window_len: usize,
    /// Read microarchitecture counters on tick
    pub uarch: bool,
}

impl MltConfig {
    /// Default period: 4ms
    pub const DEFAULT_PERIOD_NS: u64 = 4 * NSEC_PER_MSEC;
}

impl Default for MltConfig {
    fn default() -> Self {
        Self {
            period_ns: Self::DEFAULT_PERIOD_NS,
            window_len: MLT_PERIOD_COUNT,
            uarch: false,
        }
    }
}

/// Misfit & Balance Engine configuration
#[derive(Debug, Clone)]
pub struct BalanceConfig {
    /// Misfit margin in 1/1024 units (1280 = 1.25x capacity)
    pub misfit_margin: u32,
    /// Utilization share of domain capacity that makes a group busy (%)
    pub group_busy_pct: u32,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            misfit_margin: 1280,
            group_busy_pct: 80,
        }
    }
}

/// Core-Sparing Governor configuration
#[derive(Debug, Clone)]
pub struct EcsConfig {
    /// Governor enabled at boot
    pub enabled: bool,
    /// Minimum time between governor cycles (nanoseconds)
    pub update_interval_ns: u64,
    /// Consecutive non-overloaded cycles before closing a CPU
    pub close_threshold: u32,
    /// Utilization share of open capacity that counts as over-utilized (%)
    pub over_util_pct: u32,
}

impl Default for EcsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            update_interval_ns: MltConfig::DEFAULT_PERIOD_NS,
            close_threshold: 6,
            over_util_pct: 90,
        }
    }
}

/// Busy-State Monitor configuration
#[derive(Debug, Clone)]
pub struct SysbusyConfig {
    /// Host tick length (nanoseconds); monitor intervals are in ticks
    pub tick_ns: u64,
    /// Per-level monitor interval and boost duration
    pub params: [SysbusyParams; NUM_SYSBUSY_STATES],
    /// Task utilization at or above which a task is heavy
    pub heavy_task_util: u32,
    /// Share of total utilization held by heavy tasks that means they dominate (%)
    pub heavy_share_pct: u32,
    /// Minimum time between swap attempts (nanoseconds)
    pub somac_interval_ns: u64,
    /// Minimum residency of a fast-CPU task before it may be swapped out
    pub somac_min_residency_ns: u64,
}

impl Default for SysbusyConfig {
    fn default() -> Self {
        Self {
            tick_ns: MltConfig::DEFAULT_PERIOD_NS,
            params: SysbusyParams::DEFAULTS,
            heavy_task_util: 410,
            heavy_share_pct: 60,
            somac_interval_ns: 100 * NSEC_PER_MSEC,
            somac_min_residency_ns: 8 * NSEC_PER_MSEC,
        }
    }
}

/// Complete HMP configuration
#[derive(Debug, Clone)]
pub struct HmpConfig {
    /// Capacity domains, slowest first
    pub topology: Vec<DomainSpec>,
    /// Load Tracker
    pub mlt: MltConfig,
    /// Balance engine
    pub balance: BalanceConfig,
    /// Core-sparing governor
    pub ecs: EcsConfig,
    /// Busy-state monitor
    pub sysbusy: SysbusyConfig,
}

impl HmpConfig {
    /// Create a configuration for a topology with default tuning
    pub fn new(topology: Vec<DomainSpec>) -> Self {
        Self {
            topology,
            mlt: MltConfig::default(),
            balance: BalanceConfig::default(),
            ecs: EcsConfig::default(),
            sysbusy: SysbusyConfig::default(),
        }
    }

    /// Two-domain big.LITTLE layout: `little` CPUs at 256, `big` CPUs at 1024
    pub fn big_little(little: usize, big: usize) -> Self {
        let little_mask = CpuMask::first_n(little);
        let big_mask = CpuMask::first_n(little + big) - little_mask;
        Self::new(vec![
            DomainSpec::new(little_mask, 256)
                .with_exit_latency(50_000)
                .with_min_open(1),
            DomainSpec::new(big_mask, SCHED_CAPACITY_SCALE).with_exit_latency(200_000),
        ])
    }

    /// Three-domain layout: 4 little (256), 3 mid (640), 1 big (1024)
    pub fn tri_cluster() -> Self {
        Self::new(vec![
            DomainSpec::new(CpuMask::from_cpus(&[0, 1, 2, 3]), 256)
                .with_exit_latency(50_000)
                .with_min_open(1),
            DomainSpec::new(CpuMask::from_cpus(&[4, 5, 6]), 640).with_exit_latency(100_000),
            DomainSpec::new(CpuMask::from_cpus(&[7]), SCHED_CAPACITY_SCALE)
                .with_exit_latency(200_000),
        ])
    }

    /// Same tuning with the governor disabled
    pub fn without_governor(mut self) -> Self {
        self.ecs.enabled = false;
        self
    }

    /// Number of CPUs covered by the topology
    pub fn nr_cpus(&self) -> usize {
        self.topology
            .iter()
            .fold(CpuMask::empty(), |acc, d| acc | d.cpus)
            .count()
    }

    /// Check the topology and tuning values
    ///
    /// Domains must be non-empty, disjoint, strictly ascending in capacity,
    /// and together cover CPUs `0..n` with no gaps.
    pub fn validate(&self) -> HmpResult<()> {
        if self.topology.is_empty() {
            return Err(HmpError::InvalidTopology);
        }

        let mut seen = CpuMask::empty();
        let mut prev_capacity = 0;
        for domain in &self.topology {
            if domain.cpus.is_empty()
                || domain.cpus.intersects(seen)
                || domain.capacity == 0
                || domain.capacity > SCHED_CAPACITY_SCALE
                || domain.capacity <= prev_capacity
                || domain.min_open > domain.cpus.count()
            {
                return Err(HmpError::InvalidTopology);
            }
            seen |= domain.cpus;
            prev_capacity = domain.capacity;
        }

        let nr_cpus = seen.count();
        if nr_cpus > MAX_CPUS || seen != CpuMask::first_n(nr_cpus) {
            return Err(HmpError::InvalidTopology);
        }

        if self.mlt.period_ns == 0
            || self.mlt.window_len == 0
            || self.mlt.window_len > MLT_PERIOD_COUNT
            || self.sysbusy.tick_ns == 0
            || self.ecs.close_threshold == 0
        {
            return Err(HmpError::InvalidArgument);
        }

        Ok(())
    }
}

impl Default for HmpConfig {
    fn default() -> Self {
        Self::tri_cluster()
    }
}
