//! # Misfit Classification
//!
//! A task is misfit when its utilization exceeds its CPU's original capacity
//! scaled by the margin. Each CPU counts the misfit tasks enqueued on it; a
//! task's flag is set exactly when it is counted.

use crate::context::SchedContext;
use crate::cpu::{CpuRecord, RunqueueView};
use crate::task::TaskRecord;
use crate::SCHED_CAPACITY_SCALE;

/// `util * 1024 > capacity * margin`
#[inline]
pub fn is_misfit(util: u32, capacity: u32, margin: u32) -> bool {
    util as u64 * SCHED_CAPACITY_SCALE as u64 > capacity as u64 * margin as u64
}

/// Would `task` be misfit on `cpu`?
pub fn misfit_on(ctx: &SchedContext<'_>, task: &TaskRecord, cpu: &CpuRecord) -> bool {
    !ctx.domains.is_fastest(cpu.domain())
        && is_misfit(
            task.util(),
            cpu.capacity_orig(),
            ctx.config.balance.misfit_margin,
        )
}

/// Recompute the flag of a task enqueued on `cpu` and adjust the counter
///
/// Does nothing if the task is no longer on `cpu`.
pub fn update_task(ctx: &SchedContext<'_>, task: &TaskRecord, cpu: &CpuRecord) {
    let rq = cpu.rq.lock();
    update_locked(ctx, task, cpu, &rq);
}

/// [`update_task`] with `cpu`'s view already locked
pub(crate) fn update_locked(
    ctx: &SchedContext<'_>,
    task: &TaskRecord,
    cpu: &CpuRecord,
    rq: &RunqueueView,
) {
    if task.cpu() != Some(cpu.id()) || !rq.contains(task) {
        return;
    }
    let misfit = misfit_on(ctx, task, cpu);
    let was = task.swap_misfit(misfit);
    match (was, misfit) {
        (false, true) => {
            cpu.inc_misfit();
            log::trace!("[balance] task {} misfit on cpu {}", task.id().raw(), cpu.id().raw());
        }
        (true, false) => cpu.dec_misfit(),
        _ => {}
    }
}

/// Drop a task's contribution to `cpu` (dequeue, migration)
pub fn clear(task: &TaskRecord, cpu: &CpuRecord) {
    if task.swap_misfit(false) {
        cpu.dec_misfit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::migrate;
    use crate::config::HmpConfig;
    use crate::engine::EnqueueFlags;
    use crate::testing::Fixture;
    use crate::{CpuId, TaskId};

    #[test]
    fn test_margin() {
        // 256 * 1.25 = 320
        assert!(!is_misfit(320, 256, 1280));
        assert!(is_misfit(321, 256, 1280));
        assert!(is_misfit(900, 256, 1280));
        assert!(!is_misfit(1024, 1024, 1280));
    }

    #[test]
    fn test_fastest_domain_never_misfit() {
        let f = Fixture::new(HmpConfig::big_little(2, 2));
        let ctx = f.engine.ctx();
        let task = f.add_task(1, 1024);

        let big = f.engine.cpu(CpuId::new(3)).unwrap();
        assert!(!misfit_on(&ctx, &task, big));

        let little = f.engine.cpu(CpuId::new(0)).unwrap();
        assert!(misfit_on(&ctx, &task, little));
    }

    #[test]
    fn test_counter_follows_flag() {
        let f = Fixture::new(HmpConfig::big_little(2, 2));
        let ctx = f.engine.ctx();
        let cpu = f.engine.cpu(CpuId::new(0)).unwrap();
        let task = f.add_task(1, 900);

        // Not enqueued here yet
        update_task(&ctx, &task, cpu);
        assert_eq!(cpu.misfit_count(), 0);

        f.engine.enqueue(CpuId::new(0), TaskId::new(1), EnqueueFlags::empty(), 0);
        update_task(&ctx, &task, cpu);
        update_task(&ctx, &task, cpu);
        assert_eq!(cpu.misfit_count(), 1);

        task.set_util(100);
        update_task(&ctx, &task, cpu);
        assert_eq!(cpu.misfit_count(), 0);
        assert!(!task.is_misfit());

        clear(&task, cpu);
        clear(&task, cpu);
        assert_eq!(cpu.misfit_count(), 0);
    }

    #[test]
    fn test_recheck_after_task_moved_away() {
        let f = Fixture::new(HmpConfig::big_little(2, 2).without_governor());
        let ctx = f.engine.ctx();
        f.run(1, 900, 0, 0);
        let little = f.engine.cpu(CpuId::new(0)).unwrap();
        let big = f.engine.cpu(CpuId::new(2)).unwrap();

        // Tick snapshot taken, then the task is migrated before the re-check
        let current = little.current().unwrap();
        assert!(migrate::migrate_task(&ctx, &current, little, big, 1));
        update_task(&ctx, &current, little);

        assert_eq!(little.misfit_count(), 0);
        assert!(!current.is_misfit());

        f.engine.dequeue(CpuId::new(2), TaskId::new(1), 2);
        assert_eq!(little.misfit_count(), 0);
        assert_eq!(big.misfit_count(), 0);
    }
}
