//! # Task-Pair Swap
//!
//! At the top busy level a misfit task can be stuck on a slow CPU because
//! every fast CPU is occupied. If no cheap rebalance is available, the
//! longest-resident misfit task on the slowest class trades places with the
//! longest-resident task running alone on the fastest class.
//!
//! The swap runs in two halves: `attempt` claims both CPUs' in-flight flags
//! and queues [`DeferredWork::SomacFinish`]; `finish` asks the host to swap
//! and always releases both flags.

use crate::balance::migrate;
use crate::balance::misfit;
use crate::context::SchedContext;
use crate::cpu::{CpuRecord, RunqueueView};
use crate::sysbusy::SysbusyState;
use crate::task::TaskRecord;
use crate::workqueue::DeferredWork;
use crate::CpuId;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::Reverse;
use spin::MutexGuard;

/// A claimed swap awaiting completion
#[derive(Debug, Clone)]
pub struct SwapDescriptor {
    /// Slow CPU
    pub a_cpu: CpuId,
    /// Misfit task running on `a_cpu`
    pub a_task: Arc<TaskRecord>,
    /// Fast CPU
    pub b_cpu: CpuId,
    /// Task running on `b_cpu`
    pub b_task: Arc<TaskRecord>,
}

/// Result of a swap attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SomacOutcome {
    /// A queued task moved to an idle CPU instead
    Rebalanced,
    /// A swap was claimed and queued
    SwapQueued,
    /// Nothing to do
    Nothing,
}

/// Try to relieve a saturated system
pub fn attempt(ctx: &SchedContext<'_>, now: u64) -> SomacOutcome {
    if ctx.sysbusy_level() != SysbusyState::Level3 {
        return SomacOutcome::Nothing;
    }
    if !ctx.sysbusy.claim_somac(ctx.config.sysbusy.somac_interval_ns, now) {
        return SomacOutcome::Nothing;
    }

    if cheap_rebalance(ctx, now) {
        ctx.metrics.record_cheap_rebalance();
        return SomacOutcome::Rebalanced;
    }
    queue_swap(ctx, now)
}

/// Move one queued task from a crowded CPU to an idle one
fn cheap_rebalance(ctx: &SchedContext<'_>, now: u64) -> bool {
    let mut idle: Vec<&CpuRecord> = ctx
        .cpus
        .iter()
        .filter(|c| c.is_idle() && c.is_schedulable())
        .collect();
    if idle.is_empty() {
        return false;
    }
    idle.sort_by_key(|c| (Reverse(c.capacity_orig()), c.id()));

    let mut crowded: Vec<&CpuRecord> = ctx
        .cpus
        .iter()
        .filter(|c| c.nr_running() > 1 && !c.active_balance())
        .collect();
    crowded.sort_by_key(|c| (Reverse(c.nr_running()), Reverse(c.util()), c.id()));

    for src in crowded {
        let queued: Vec<Arc<TaskRecord>> = src.rq.lock().queued().cloned().collect();
        for task in &queued {
            for dst in &idle {
                if migrate::migrate_task(ctx, task, src, dst, now) {
                    log::debug!(
                        "[sysbusy] rebalanced task {} {} -> {}",
                        task.id().raw(),
                        src.id().raw(),
                        dst.id().raw()
                    );
                    return true;
                }
            }
        }
    }
    false
}

fn queue_swap(ctx: &SchedContext<'_>, now: u64) -> SomacOutcome {
    let (Some(slow), Some(fast)) = (ctx.domains.slowest(), ctx.domains.fastest()) else {
        return SomacOutcome::Nothing;
    };
    if slow.index() == fast.index() {
        return SomacOutcome::Nothing;
    }

    let Some((a, a_task)) = ctx
        .cpus
        .iter_mask(slow.cpus())
        .filter(|c| !c.active_balance())
        .filter_map(|c| {
            c.current()
                .filter(|t| t.is_misfit() && !t.is_migration_disabled())
                .map(|t| (c, t))
        })
        .max_by_key(|(c, t)| (t.residency(now), Reverse(c.id())))
    else {
        return SomacOutcome::Nothing;
    };

    let min_residency = ctx.config.sysbusy.somac_min_residency_ns;
    let Some((b, b_task)) = ctx
        .cpus
        .iter_mask(fast.cpus())
        .filter(|c| !c.active_balance() && c.nr_running() == 1)
        .filter_map(|c| {
            c.current()
                .filter(|t| {
                    !t.is_pinned()
                        && !t.is_migration_disabled()
                        && t.residency(now) >= min_residency
                        && t.can_run_on(a.id())
                        && a_task.can_run_on(c.id())
                })
                .map(|t| (c, t))
        })
        .max_by_key(|(c, t)| (t.residency(now), Reverse(c.id())))
    else {
        return SomacOutcome::Nothing;
    };

    if !a.try_claim_active_balance() {
        return SomacOutcome::Nothing;
    }
    if !b.try_claim_active_balance() {
        a.release_active_balance();
        return SomacOutcome::Nothing;
    }

    let (ra, rb) = lock_pair(a, b);
    if !runs(&ra, &a_task) || !runs(&rb, &b_task) {
        drop((ra, rb));
        a.release_active_balance();
        b.release_active_balance();
        return SomacOutcome::Nothing;
    }
    ctx.deferred.push(DeferredWork::SomacFinish(SwapDescriptor {
        a_cpu: a.id(),
        a_task,
        b_cpu: b.id(),
        b_task,
    }));
    SomacOutcome::SwapQueued
}

/// Complete a claimed swap; returns true if the tasks traded places
pub fn finish(ctx: &SchedContext<'_>, desc: &SwapDescriptor, now: u64) -> bool {
    let (Some(a), Some(b)) = (ctx.cpu(desc.a_cpu), ctx.cpu(desc.b_cpu)) else {
        return false;
    };

    let swapped = {
        let (mut ra, mut rb) = lock_pair(a, b);
        let ok = runs(&ra, &desc.a_task)
            && runs(&rb, &desc.b_task)
            && ctx
                .host
                .swap_running(&desc.a_task, a.id(), &desc.b_task, b.id());
        if ok {
            exchange(ctx, a, &mut ra, &desc.a_task, b, &mut rb, &desc.b_task, now);
        }
        ok
    };

    a.release_active_balance();
    b.release_active_balance();

    if swapped {
        ctx.metrics.record_swap();
        log::debug!(
            "[sysbusy] swapped task {} (cpu {}) with task {} (cpu {})",
            desc.a_task.id().raw(),
            a.id().raw(),
            desc.b_task.id().raw(),
            b.id().raw()
        );
    } else {
        ctx.metrics.record_aborted();
    }
    swapped
}

#[allow(clippy::too_many_arguments)]
fn exchange(
    ctx: &SchedContext<'_>,
    a: &CpuRecord,
    ra: &mut RunqueueView,
    a_task: &Arc<TaskRecord>,
    b: &CpuRecord,
    rb: &mut RunqueueView,
    b_task: &Arc<TaskRecord>,
    now: u64,
) {
    ra.remove(a_task);
    misfit::clear(a_task, a);
    rb.remove(b_task);
    misfit::clear(b_task, b);

    ra.insert(b_task.clone());
    ra.current = Some(b_task.clone());
    rb.insert(a_task.clone());
    rb.current = Some(a_task.clone());

    b_task.set_cpu(Some(a.id()));
    b_task.set_enqueued_at(now);
    a_task.set_cpu(Some(b.id()));
    a_task.set_enqueued_at(now);

    a.publish(ra);
    b.publish(rb);
    misfit::update_locked(ctx, b_task, a, ra);
    misfit::update_locked(ctx, a_task, b, rb);
}

fn runs(rq: &RunqueueView, task: &TaskRecord) -> bool {
    rq.current().is_some_and(|c| c.id() == task.id())
}

/// Lock two views in CPU id order; guards come back in `(a, b)` order
fn lock_pair<'a>(
    a: &'a CpuRecord,
    b: &'a CpuRecord,
) -> (MutexGuard<'a, RunqueueView>, MutexGuard<'a, RunqueueView>) {
    if a.id() < b.id() {
        let ra = a.rq.lock();
        let rb = b.rq.lock();
        (ra, rb)
    } else {
        let rb = b.rq.lock();
        let ra = a.rq.lock();
        (ra, rb)
    }
}
