//! # Active Push
//!
//! Tick-driven: if the task running on a CPU is misfit, or heavy while the
//! system is at busy level 2 or above, hand it to a faster idle CPU.

use super::migrate::{self, MigrationWork};
use super::misfit::is_misfit;
use crate::context::SchedContext;
use crate::cpu::CpuRecord;
use crate::sysbusy::SysbusyState;
use crate::task::TaskRecord;
use crate::CpuId;
use core::cmp::Reverse;

/// Pick a push target for `task` running on `src`
///
/// Candidates are idle, schedulable, allowed CPUs of strictly higher
/// capacity. The smallest class the task fits in wins; if it fits nowhere,
/// the fastest. Ties go to the lower exit latency, then the lower id.
pub fn select_target<'a>(
    ctx: &SchedContext<'a>,
    task: &TaskRecord,
    src: &CpuRecord,
) -> Option<&'a CpuRecord> {
    let margin = ctx.config.balance.misfit_margin;
    let candidates = || {
        ctx.cpus.iter().filter(move |c| {
            c.capacity_orig() > src.capacity_orig()
                && c.is_idle()
                && c.is_schedulable()
                && task.can_run_on(c.id())
        })
    };

    candidates()
        .filter(|c| !is_misfit(task.util(), c.capacity_orig(), margin))
        .min_by_key(|c| (c.capacity_orig(), c.exit_latency_ns(), c.id()))
        .or_else(|| {
            candidates().min_by_key(|c| (Reverse(c.capacity_orig()), c.exit_latency_ns(), c.id()))
        })
}

/// Check the running task of `cpu`; returns true if a push was queued
pub fn check(ctx: &SchedContext<'_>, cpu: CpuId) -> bool {
    let Some(src) = ctx.cpu(cpu) else {
        return false;
    };
    let Some(task) = src.current() else {
        return false;
    };
    if task.is_migration_disabled() || src.active_balance() {
        return false;
    }

    let boosted = task.is_heavy() && ctx.sysbusy_level() >= SysbusyState::Level2;
    if !task.is_misfit() && !boosted {
        return false;
    }

    let Some(dst) = select_target(ctx, &task, src) else {
        log::trace!("[balance] no push target for task {}", task.id().raw());
        return false;
    };

    let work = MigrationWork::Push { task: task.clone(), src: src.id(), dst: dst.id() };
    if !migrate::dispatch(src, work) {
        return false;
    }
    ctx.metrics.record_active_push();
    log::debug!(
        "[balance] push task {} {} -> {}",
        task.id().raw(),
        src.id().raw(),
        dst.id().raw()
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HmpConfig;
    use crate::testing::Fixture;
    use crate::{CpuMask, TaskId};

    #[test]
    fn test_smallest_fitting_class() {
        let f = Fixture::new(HmpConfig::tri_cluster().without_governor());
        // 400 fits a 640 CPU (limit 800) but not a 256 CPU
        let task = f.run(1, 400, 0, 0);
        let ctx = f.engine.ctx();
        let src = f.engine.cpu(CpuId::new(0)).unwrap();

        assert_eq!(select_target(&ctx, &task, src).unwrap().id(), CpuId::new(4));
    }

    #[test]
    fn test_fastest_when_nothing_fits() {
        let mut config = HmpConfig::tri_cluster().without_governor();
        config.balance.misfit_margin = 1024;
        let f = Fixture::new(config);
        let task = f.run(1, 1024, 0, 0);
        let ctx = f.engine.ctx();
        let src = f.engine.cpu(CpuId::new(0)).unwrap();

        // Nothing strictly fits below 1024 with a 1.0 margin except the big CPU
        assert_eq!(select_target(&ctx, &task, src).unwrap().id(), CpuId::new(7));

        task.set_allowed(CpuMask::from_cpus(&[0, 4, 5]));
        task.set_util(1000);
        assert_eq!(select_target(&ctx, &task, src).unwrap().id(), CpuId::new(4));
    }

    #[test]
    fn test_push_misfit() {
        let f = Fixture::new(HmpConfig::big_little(2, 2).without_governor());
        f.run(1, 900, 0, 0);

        assert!(check(&f.engine.ctx(), CpuId::new(0)));
        // In flight: no second push
        assert!(!check(&f.engine.ctx(), CpuId::new(0)));

        f.engine.run_stopper(CpuId::new(0), 1);
        let task = f.engine.task(TaskId::new(1)).unwrap();
        assert_eq!(task.cpu(), Some(CpuId::new(2)));
        assert_eq!(f.engine.cpu(CpuId::new(0)).unwrap().misfit_count(), 0);
        assert!(!task.is_misfit());
    }

    #[test]
    fn test_fitting_task_stays() {
        let f = Fixture::new(HmpConfig::big_little(2, 2).without_governor());
        f.run(1, 100, 0, 0);
        assert!(!check(&f.engine.ctx(), CpuId::new(0)));
    }

    #[test]
    fn test_migration_disabled_stays() {
        let f = Fixture::new(HmpConfig::big_little(2, 2).without_governor());
        let task = f.run(1, 900, 0, 0);
        task.set_migration_disabled(true);
        assert!(!check(&f.engine.ctx(), CpuId::new(0)));
    }
}
