//! # Idle Pull
//!
//! A CPU about to go idle looks for work on busier CPUs. A faster CPU only
//! raids a slower domain that is group busy or holds misfit tasks; a slower
//! CPU may pull from its own or any faster domain.

use super::migrate::{self, MigrationWork};
use super::misfit;
use crate::context::SchedContext;
use crate::cpu::CpuRecord;
use crate::domain::Domain;
use crate::task::TaskRecord;
use crate::{CpuId, TaskId};
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Result of an idle-pull attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// A queued task was moved
    Pulled {
        /// Moved task
        task: TaskId,
        /// Source CPU
        src: CpuId,
    },
    /// A running misfit task will be pushed by the source's stopper
    Dispatched {
        /// Task to move
        task: TaskId,
        /// Source CPU
        src: CpuId,
    },
    /// Nothing to do
    Nothing,
}

/// Group busy: more runnable tasks than CPUs and utilization near capacity
pub fn group_busy(ctx: &SchedContext<'_>, domain: &Domain) -> bool {
    let (nr, util) = ctx
        .cpus
        .iter_mask(domain.cpus())
        .fold((0usize, 0u64), |(nr, util), c| {
            (nr + c.nr_running() as usize, util + c.util() as u64)
        });
    nr > domain.nr_cpus()
        && util * 100 >= domain.capacity_sum() as u64 * ctx.config.balance.group_busy_pct as u64
}

fn has_misfit(ctx: &SchedContext<'_>, domain: &Domain) -> bool {
    ctx.cpus
        .iter_mask(domain.cpus())
        .any(|c| c.misfit_count() > 0)
}

/// Run idle pull for `dst`
pub fn idle_balance(ctx: &SchedContext<'_>, dst: CpuId, now: u64) -> PullOutcome {
    let Some(dst) = ctx.cpu(dst) else {
        return PullOutcome::Nothing;
    };
    if !dst.is_idle() || !dst.is_schedulable() {
        return PullOutcome::Nothing;
    }

    let mut sources: Vec<&CpuRecord> = ctx
        .domains
        .iter()
        .filter(|d| {
            d.index() >= dst.domain() || group_busy(ctx, d) || has_misfit(ctx, d)
        })
        .flat_map(|d| ctx.cpus.iter_mask(d.cpus()))
        .filter(|c| c.id() != dst.id() && c.nr_running() > 0 && !c.active_balance())
        .collect();
    if sources.is_empty() {
        return PullOutcome::Nothing;
    }

    // Busiest first; cheaper wakeup breaks ties
    sources.sort_by_key(|c| (core::cmp::Reverse(c.util()), c.exit_latency_ns(), c.id()));

    for allow_pinned in [false, true] {
        for src in &sources {
            if let Some(outcome) = pull_from(ctx, src, dst, allow_pinned, now) {
                ctx.metrics.record_idle_pull();
                return outcome;
            }
        }
    }
    PullOutcome::Nothing
}

fn pull_from(
    ctx: &SchedContext<'_>,
    src: &CpuRecord,
    dst: &CpuRecord,
    allow_pinned: bool,
    now: u64,
) -> Option<PullOutcome> {
    let (mut queued, current) = {
        let rq = src.rq.lock();
        let queued: Vec<Arc<TaskRecord>> = rq
            .queued()
            .filter(|t| movable(ctx, t, src, dst, allow_pinned))
            .cloned()
            .collect();
        (queued, rq.current().cloned())
    };

    // Misfit tasks first, then the largest
    queued.sort_by_key(|t| (!t.is_misfit(), core::cmp::Reverse(t.util())));
    for task in &queued {
        if migrate::migrate_task(ctx, task, src, dst, now) {
            return Some(PullOutcome::Pulled { task: task.id(), src: src.id() });
        }
    }

    let current = current?;
    if current.is_misfit()
        && dst.capacity_orig() > src.capacity_orig()
        && movable(ctx, &current, src, dst, allow_pinned)
        && migrate::dispatch(
            src,
            MigrationWork::Push { task: current.clone(), src: src.id(), dst: dst.id() },
        )
    {
        log::debug!(
            "[balance] idle cpu {} requests push of running task {} from cpu {}",
            dst.id().raw(),
            current.id().raw(),
            src.id().raw()
        );
        return Some(PullOutcome::Dispatched { task: current.id(), src: src.id() });
    }
    None
}

fn movable(
    ctx: &SchedContext<'_>,
    task: &TaskRecord,
    src: &CpuRecord,
    dst: &CpuRecord,
    allow_pinned: bool,
) -> bool {
    if !task.can_migrate_to(dst.id()) || (task.is_pinned() && !allow_pinned) {
        return false;
    }
    // Never pull onto a slower CPU where the task would be misfit
    dst.capacity_orig() >= src.capacity_orig() || !misfit::misfit_on(ctx, task, dst)
}
