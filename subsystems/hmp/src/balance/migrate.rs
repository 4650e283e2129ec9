//! # Migration Primitive
//!
//! The one place tasks change CPU. Physical moves are delegated to the
//! host; the engine's run-queue views, misfit counters and runnable
//! trackers are updated here once the host agrees.
//!
//! ## Stopper
//!
//! Moving a running task has to happen on its own CPU. Work for that is
//! queued on the source CPU's [`Stopper`] and executed by `run_stopper`.
//! The source's in-flight flag is claimed before queueing and released when
//! the work item finishes, whatever its outcome, so a CPU never has more
//! than one migration outstanding.

use super::misfit;
use crate::context::SchedContext;
use crate::cpu::{CpuRecord, RunqueueView};
use crate::task::TaskRecord;
use crate::CpuId;
use alloc::sync::Arc;
use core::fmt;
use heapless::mpmc::Q4;

/// Work executed on a source CPU
#[derive(Debug, Clone)]
pub enum MigrationWork {
    /// Move one task to `dst`
    Push {
        /// Task to move
        task: Arc<TaskRecord>,
        /// CPU it was on when queued
        src: CpuId,
        /// Target CPU
        dst: CpuId,
    },
    /// Move every movable task off a spared CPU
    Drain {
        /// CPU to empty
        src: CpuId,
    },
}

/// Per-CPU fire-and-forget work queue
pub struct Stopper {
    queue: Q4<MigrationWork>,
}

impl Stopper {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self { queue: Q4::new() }
    }

    /// Queue work; hands the item back when full
    pub fn push(&self, work: MigrationWork) -> Result<(), MigrationWork> {
        self.queue.enqueue(work)
    }

    /// Take the oldest item
    pub fn pop(&self) -> Option<MigrationWork> {
        self.queue.dequeue()
    }
}

impl Default for Stopper {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Stopper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stopper").finish_non_exhaustive()
    }
}

/// Queue work on `src`'s stopper
///
/// Returns false if a migration from `src` is already in flight or the
/// queue is full.
pub fn dispatch(src: &CpuRecord, work: MigrationWork) -> bool {
    if !src.try_claim_active_balance() {
        log::trace!("[balance] cpu {} already migrating", src.id().raw());
        return false;
    }
    if src.stopper.push(work).is_err() {
        src.release_active_balance();
        return false;
    }
    true
}

/// Execute all work queued on `cpu`; returns the number of items run
pub fn run_stopper(ctx: &SchedContext<'_>, cpu: &CpuRecord, now: u64) -> usize {
    let mut ran = 0;
    while let Some(work) = cpu.stopper.pop() {
        match work {
            MigrationWork::Push { task, src, dst } => {
                if src != cpu.id() || !push(ctx, &task, cpu, dst, now) {
                    ctx.metrics.record_aborted();
                }
            }
            MigrationWork::Drain { src } => {
                if src == cpu.id() {
                    drain(ctx, cpu, now);
                }
            }
        }
        cpu.release_active_balance();
        ran += 1;
    }
    ran
}

fn push(ctx: &SchedContext<'_>, task: &Arc<TaskRecord>, src: &CpuRecord, dst: CpuId, now: u64) -> bool {
    let Some(dst) = ctx.cpu(dst) else {
        return false;
    };
    if !dst.is_schedulable() {
        log::trace!("[balance] push target cpu {} no longer schedulable", dst.id().raw());
        return false;
    }
    migrate_task(ctx, task, src, dst, now)
}

/// Move every movable task off a CPU that left the schedulable set
fn drain(ctx: &SchedContext<'_>, src: &CpuRecord, now: u64) {
    if src.is_schedulable() {
        return;
    }
    for task in src.tasks() {
        let Some(dst) = drain_target(ctx, &task, src) else {
            log::trace!("[balance] no drain target for task {}", task.id().raw());
            continue;
        };
        migrate_task(ctx, &task, src, dst, now);
    }
}

/// Least-loaded schedulable CPU of the same class, else of any class
pub fn drain_target<'a>(
    ctx: &SchedContext<'a>,
    task: &TaskRecord,
    src: &CpuRecord,
) -> Option<&'a CpuRecord> {
    let candidates = || {
        ctx.cpus
            .iter()
            .filter(move |c| c.id() != src.id() && c.is_schedulable() && task.can_run_on(c.id()))
    };
    candidates()
        .filter(|c| c.domain() == src.domain())
        .min_by_key(|c| (c.util(), c.id()))
        .or_else(|| candidates().min_by_key(|c| (c.util(), c.id())))
}

/// Move `task` from `src` to `dst`
///
/// Silently returns false when the task is no longer on `src`, may not run
/// on `dst`, has migration disabled, or the host refuses.
pub fn migrate_task(
    ctx: &SchedContext<'_>,
    task: &Arc<TaskRecord>,
    src: &CpuRecord,
    dst: &CpuRecord,
    now: u64,
) -> bool {
    if src.id() == dst.id() || !task.can_migrate_to(dst.id()) || task.cpu() != Some(src.id()) {
        return false;
    }

    {
        let mut rq = src.rq.lock();
        if !rq.contains(task) {
            return false;
        }
        if !ctx.host.move_task(task, src.id(), dst.id()) {
            log::debug!(
                "[balance] host refused move of task {} {} -> {}",
                task.id().raw(),
                src.id().raw(),
                dst.id().raw()
            );
            return false;
        }
        detach_locked(ctx, task, src, &mut rq, now);
    }
    attach_task(ctx, task, dst, now);

    ctx.metrics.record_migration();
    log::debug!(
        "[balance] migrated task {} {} -> {}",
        task.id().raw(),
        src.id().raw(),
        dst.id().raw()
    );
    true
}

/// Remove a task from a locked view and fix up counters
pub(crate) fn detach_locked(
    ctx: &SchedContext<'_>,
    task: &TaskRecord,
    cpu: &CpuRecord,
    rq: &mut RunqueueView,
    now: u64,
) -> bool {
    let was_current = rq.current().is_some_and(|c| c.id() == task.id());
    if !rq.remove(task) {
        return false;
    }
    cpu.publish(rq);
    misfit::clear(task, cpu);
    ctx.tracker.cpu_nr_running(cpu, rq.nr_running() as u32, now);
    if was_current {
        ctx.tracker.task_state_change(task, false, now);
        ctx.tracker.cpu_state_change(cpu, false, now);
    }
    true
}

/// Remove a task from `cpu`'s view
pub(crate) fn detach_task(ctx: &SchedContext<'_>, task: &TaskRecord, cpu: &CpuRecord, now: u64) -> bool {
    let mut rq = cpu.rq.lock();
    detach_locked(ctx, task, cpu, &mut rq, now)
}

/// Add a task to a locked view and fix up counters
pub(crate) fn attach_locked(
    ctx: &SchedContext<'_>,
    task: &Arc<TaskRecord>,
    cpu: &CpuRecord,
    rq: &mut RunqueueView,
    now: u64,
) -> bool {
    if !rq.insert(task.clone()) {
        return false;
    }
    task.set_cpu(Some(cpu.id()));
    task.set_enqueued_at(now);
    cpu.publish(rq);
    misfit::update_locked(ctx, task, cpu, rq);
    ctx.tracker.cpu_nr_running(cpu, rq.nr_running() as u32, now);
    true
}

/// Add a task to `cpu`'s view
pub(crate) fn attach_task(ctx: &SchedContext<'_>, task: &Arc<TaskRecord>, cpu: &CpuRecord, now: u64) -> bool {
    let mut rq = cpu.rq.lock();
    attach_locked(ctx, task, cpu, &mut rq, now)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::config::HmpConfig;
    use crate::engine::EnqueueFlags;
    use crate::testing::Fixture;
    use crate::TaskId;
    use core::sync::atomic::Ordering;

    #[test]
    fn test_migrate_updates_views() {
        let f = Fixture::new(HmpConfig::big_little(2, 2).without_governor());
        let task = f.add_task(1, 900);
        f.engine.enqueue(CpuId::new(0), TaskId::new(1), EnqueueFlags::empty(), 0);

        let ctx = f.engine.ctx();
        let src = f.engine.cpu(CpuId::new(0)).unwrap();
        let dst = f.engine.cpu(CpuId::new(2)).unwrap();
        assert_eq!(src.misfit_count(), 1);

        assert!(migrate_task(&ctx, &task, src, dst, 10));
        assert_eq!(src.nr_running(), 0);
        assert_eq!(dst.nr_running(), 1);
        assert_eq!(src.misfit_count(), 0);
        assert_eq!(task.cpu(), Some(CpuId::new(2)));
        assert_eq!(task.enqueued_at(), 10);
        assert_eq!(f.host.moves().len(), 1);
        assert_eq!(f.engine.metrics().snapshot().migrations, 1);
    }

    #[test]
    fn test_migrate_respects_gates() {
        let f = Fixture::new(HmpConfig::big_little(2, 2).without_governor());
        let task = f.add_task(1, 900);
        f.engine.enqueue(CpuId::new(0), TaskId::new(1), EnqueueFlags::empty(), 0);
        let ctx = f.engine.ctx();
        let src = f.engine.cpu(CpuId::new(0)).unwrap();
        let dst = f.engine.cpu(CpuId::new(2)).unwrap();

        task.set_migration_disabled(true);
        assert!(!migrate_task(&ctx, &task, src, dst, 1));
        task.set_migration_disabled(false);

        // Wrong source
        assert!(!migrate_task(&ctx, &task, dst, src, 1));

        f.host.refuse.store(true, Ordering::SeqCst);
        assert!(!migrate_task(&ctx, &task, src, dst, 1));
        assert_eq!(task.cpu(), Some(CpuId::new(0)));
        assert_eq!(src.misfit_count(), 1);
    }

    #[test]
    fn test_dispatch_single_in_flight() {
        let f = Fixture::new(HmpConfig::big_little(2, 2).without_governor());
        let src = f.engine.cpu(CpuId::new(0)).unwrap();

        let winners = std::thread::scope(|s| {
            let handles: std::vec::Vec<_> = (0..8)
                .map(|_| s.spawn(|| dispatch(src, MigrationWork::Drain { src: CpuId::new(0) })))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count()
        });

        assert_eq!(winners, 1);
        assert!(src.active_balance());
        assert_eq!(run_stopper(&f.engine.ctx(), src, 0), 1);
        assert!(!src.active_balance());
    }

    #[test]
    fn test_stale_push_dropped_and_flag_cleared() {
        let f = Fixture::new(HmpConfig::big_little(2, 2).without_governor());
        let task = f.add_task(1, 900);
        let src = f.engine.cpu(CpuId::new(0)).unwrap();

        // Task never enqueued on the source: preconditions fail at run time.
        assert!(dispatch(
            src,
            MigrationWork::Push { task, src: CpuId::new(0), dst: CpuId::new(2) }
        ));
        assert_eq!(run_stopper(&f.engine.ctx(), src, 0), 1);
        assert!(!src.active_balance());
        assert_eq!(f.engine.metrics().snapshot().aborted_migrations, 1);
        assert!(f.host.moves().is_empty());
    }

    #[test]
    fn test_drain_target_prefers_same_class() {
        let f = Fixture::new(HmpConfig::tri_cluster().without_governor());
        let task = f.add_task(1, 100);
        f.engine.enqueue(CpuId::new(1), TaskId::new(1), EnqueueFlags::empty(), 0);
        let ctx = f.engine.ctx();
        let src = f.engine.cpu(CpuId::new(0)).unwrap();

        // cpu 1 is busier, so cpu 2 is the least-loaded little CPU
        let dst = drain_target(&ctx, &task, src).unwrap();
        assert_eq!(dst.id(), CpuId::new(2));

        let only_big = crate::CpuMask::from_cpus(&[7]);
        task.set_allowed(only_big);
        assert_eq!(drain_target(&ctx, &task, src).unwrap().id(), CpuId::new(7));
    }
}
