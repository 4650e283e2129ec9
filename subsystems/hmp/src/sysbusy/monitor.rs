//! # Busy-State Monitor

use super::state::SysbusyState;
use crate::config::SysbusyConfig;
use crate::context::SchedContext;
use crate::task::TaskRecord;
use crate::workqueue::DeferredWork;
use crate::SCHED_CAPACITY_SCALE;
use core::sync::atomic::{AtomicU64, AtomicU8, Ordering};

const NEVER: u64 = u64::MAX;

/// Aggregate load snapshot used to pick a level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SysbusyProfile {
    /// CPUs considered
    pub nr_cpus: usize,
    /// CPUs at or above their domain's busy ratio
    pub busy_cpus: usize,
    /// Enqueued tasks at or above the heavy threshold
    pub heavy_tasks: usize,
    /// Utilization of heavy tasks
    pub heavy_util_sum: u64,
    /// Utilization of all enqueued tasks
    pub total_util_sum: u64,
    /// Sum of per-CPU average runnable counts (100 = one task)
    pub avg_nr_run_sum: u64,
}

impl SysbusyProfile {
    /// Build a profile, refreshing every task's heavy flag
    pub fn collect(ctx: &SchedContext<'_>, now: u64) -> Self {
        let mut profile = Self::default();

        for cpu in ctx.cpus.iter() {
            profile.nr_cpus += 1;
            profile.avg_nr_run_sum += ctx.tracker.cpu_avg_nr_run(cpu, now) as u64;

            let busy_ratio = ctx.domain_of(cpu).map_or(SCHED_CAPACITY_SCALE, |d| d.busy_ratio());
            let ratio = ctx.tracker.cpu_active_ratio(cpu, now);
            let util_busy = cpu.util() as u64 * SCHED_CAPACITY_SCALE as u64
                >= cpu.capacity_orig() as u64 * busy_ratio as u64;
            if ratio >= busy_ratio || (cpu.nr_running() > 0 && util_busy) {
                profile.busy_cpus += 1;
            }
        }

        let heavy_util = ctx.config.sysbusy.heavy_task_util;
        ctx.tasks.for_each(|task| {
            let enqueued = task.cpu().is_some();
            let heavy = enqueued && task.util() >= heavy_util;
            task.set_heavy(heavy);
            if enqueued {
                profile.total_util_sum += task.util() as u64;
            }
            if heavy {
                profile.heavy_tasks += 1;
                profile.heavy_util_sum += task.util() as u64;
            }
        });

        profile
    }

    /// Level this profile maps to
    pub fn level(&self, config: &SysbusyConfig) -> SysbusyState {
        let all_busy = self.nr_cpus > 0 && self.busy_cpus == self.nr_cpus;
        let heavy_dominant = self.heavy_tasks > 0
            && self.heavy_util_sum * 100 >= self.total_util_sum * config.heavy_share_pct as u64;

        if all_busy && heavy_dominant {
            SysbusyState::Level3
        } else if all_busy || self.avg_nr_run_sum > self.nr_cpus as u64 * 100 {
            SysbusyState::Level2
        } else if self.busy_cpus * 2 >= self.nr_cpus.max(1) || self.heavy_tasks > 0 {
            SysbusyState::Level1
        } else {
            SysbusyState::Level0
        }
    }
}

/// Busy-state monitor
#[derive(Debug)]
pub struct SysbusyMonitor {
    /// Current level
    state: AtomicU8,
    /// When the current level was entered
    entered_at: AtomicU64,
    /// Last recomputation
    last_update: AtomicU64,
    /// Last swap attempt
    last_somac: AtomicU64,
}

impl SysbusyMonitor {
    /// Start at `Level0`
    pub fn new(now: u64) -> Self {
        Self {
            state: AtomicU8::new(SysbusyState::Level0 as u8),
            entered_at: AtomicU64::new(now),
            last_update: AtomicU64::new(now),
            last_somac: AtomicU64::new(NEVER),
        }
    }

    /// Current level
    pub fn state(&self) -> SysbusyState {
        SysbusyState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Heavy task at level 2 or above
    pub fn is_boosted(&self, task: &TaskRecord) -> bool {
        task.is_heavy() && self.state() >= SysbusyState::Level2
    }

    /// Recompute the level if the current level's interval elapsed
    ///
    /// Exactly one caller wins each interval. Returns the transition, if any.
    pub fn update(&self, ctx: &SchedContext<'_>, now: u64) -> Option<(SysbusyState, SysbusyState)> {
        let config = &ctx.config.sysbusy;
        let params = config.params[self.state().index()];
        let interval = params.monitor_interval_ticks as u64 * config.tick_ns;

        let last = self.last_update.load(Ordering::Acquire);
        if now.saturating_sub(last) < interval {
            return None;
        }
        if self
            .last_update
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let target = SysbusyProfile::collect(ctx, now).level(config);
        self.transition(ctx, target, now)
    }

    /// Move toward `target`: up immediately, down after the boost duration
    pub(crate) fn transition(
        &self,
        ctx: &SchedContext<'_>,
        target: SysbusyState,
        now: u64,
    ) -> Option<(SysbusyState, SysbusyState)> {
        let old = self.state();
        if target == old {
            return None;
        }
        if target < old {
            let boost = ctx.config.sysbusy.params[old.index()].boost_duration_ns;
            let entered = self.entered_at.load(Ordering::Acquire);
            if now.saturating_sub(entered) <= boost {
                return None;
            }
        }

        self.state.store(target as u8, Ordering::Release);
        self.entered_at.store(now, Ordering::Release);
        ctx.metrics.record_sysbusy_transition();
        ctx.deferred.push(DeferredWork::SysbusyChanged { old, new: target });
        log::debug!("[sysbusy] {:?} -> {:?}", old, target);
        Some((old, target))
    }

    /// Claim the swap slot if the swap interval elapsed
    pub(crate) fn claim_somac(&self, interval_ns: u64, now: u64) -> bool {
        let last = self.last_somac.load(Ordering::Acquire);
        if last != NEVER && now.saturating_sub(last) < interval_ns {
            return false;
        }
        self.last_somac
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
