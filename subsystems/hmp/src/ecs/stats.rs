//! # Domain Statistics
//!
//! Per-cycle aggregates over a domain's open CPUs, and the flags derived
//! from them. Aggregation reads per-CPU snapshots without a global lock, so
//! the numbers may be slightly stale.

use crate::context::SchedContext;
use crate::cpumask::CpuMask;
use crate::domain::Domain;
use crate::mlt::NR_RUN_UNIT;
use bitflags::bitflags;

bitflags! {
    /// Domain classification for one governor cycle
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DomainFlags: u32 {
        /// More runnable tasks than open CPUs
        const OVER_RUN = 1 << 0;
        /// Runnable tasks would fit on one CPU fewer
        const UNDER_RUN = 1 << 1;
        /// Some open CPU is idle
        const HAS_IDLE = 1 << 2;
        /// Active ratio sum above the open CPUs' busy budget
        const OVER_AR = 1 << 3;
        /// Active ratio sum would fit on one CPU fewer
        const UNDER_AR = 1 << 4;
        /// Utilization above the over-util share of open capacity
        const OVER_UTIL = 1 << 5;
        /// Overloaded with utilization at or above open capacity
        const OVERFULL = 1 << 6;
        /// Misfit pressure from the slower domain exceeds idle open CPUs
        const HELP_PREV = 1 << 7;
    }
}

impl DomainFlags {
    /// Should the domain open CPUs this cycle?
    pub fn is_overloaded(self) -> bool {
        self.contains(Self::HELP_PREV)
            || self.contains(Self::OVER_UTIL)
            || (!self.contains(Self::HAS_IDLE) && self.intersects(Self::OVER_RUN | Self::OVER_AR))
    }
}

/// Aggregates over a domain's open CPUs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainStats {
    /// Open CPUs
    pub nr_open: u32,
    /// Sum of open CPUs' original capacity
    pub open_capacity: u32,
    /// Sum of average runnable counts (100 = one task)
    pub avg_nr_run: u32,
    /// Open CPUs running something or above the busy ratio
    pub busy_cpus: u32,
    /// Fair + real-time utilization
    pub util_sum: u32,
    /// Windowed active ratio sum
    pub ar_sum: u32,
    /// Misfit tasks
    pub misfit_sum: u32,
}

impl DomainStats {
    /// Aggregate `domain`'s CPUs that are in `open`
    pub fn collect(ctx: &SchedContext<'_>, domain: &Domain, open: CpuMask, now: u64) -> Self {
        let mut stats = Self::default();
        for cpu in ctx.cpus.iter_mask(open & domain.cpus()) {
            let ar = ctx.tracker.cpu_active_ratio(cpu, now);
            stats.nr_open += 1;
            stats.open_capacity += cpu.capacity_orig();
            stats.avg_nr_run += ctx.tracker.cpu_avg_nr_run(cpu, now);
            stats.util_sum += cpu.util();
            stats.ar_sum += ar;
            stats.misfit_sum += cpu.misfit_count();
            if cpu.nr_running() > 0 || ar >= domain.busy_ratio() {
                stats.busy_cpus += 1;
            }
        }
        stats
    }

    /// Open CPUs neither running nor busy
    pub fn idle_open(&self) -> u32 {
        self.nr_open.saturating_sub(self.busy_cpus)
    }

    /// Runnable tasks beyond one per open CPU, rounded up
    pub fn excess_runnable(&self) -> u32 {
        self.avg_nr_run
            .saturating_sub(self.nr_open * NR_RUN_UNIT)
            .div_ceil(NR_RUN_UNIT)
    }

    /// Derive this cycle's flags
    ///
    /// `incoming` is misfit pressure handed up by the slower domain.
    pub fn classify(&self, busy_ratio: u32, over_util_pct: u32, incoming: u32) -> DomainFlags {
        let mut flags = DomainFlags::empty();
        let fewer = self.nr_open.saturating_sub(1);

        if self.avg_nr_run > self.nr_open * NR_RUN_UNIT {
            flags |= DomainFlags::OVER_RUN;
        }
        if self.nr_open > 1 && self.avg_nr_run < fewer * NR_RUN_UNIT {
            flags |= DomainFlags::UNDER_RUN;
        }
        if self.busy_cpus < self.nr_open {
            flags |= DomainFlags::HAS_IDLE;
        }
        if self.ar_sum > busy_ratio * self.nr_open {
            flags |= DomainFlags::OVER_AR;
        }
        if self.nr_open > 1 && self.ar_sum < busy_ratio * fewer {
            flags |= DomainFlags::UNDER_AR;
        }
        if self.util_sum as u64 * 100 > self.open_capacity as u64 * over_util_pct as u64 {
            flags |= DomainFlags::OVER_UTIL;
        }
        if incoming > self.idle_open() {
            flags |= DomainFlags::HELP_PREV;
        }
        if flags.is_overloaded() && self.util_sum >= self.open_capacity {
            flags |= DomainFlags::OVERFULL;
        }
        flags
    }
}
