//! # HMP Engine
//!
//! Facade owning every service. The host calls the hooks below from its
//! scheduler paths; all of them are silent no-ops on unknown CPUs or tasks.
//!
//! ## Tick
//!
//! ```text
//!   tick(cpu, now)
//!     ├─ load tracker: CPU window, running task window, uarch counters
//!     ├─ misfit re-evaluation of the running task
//!     ├─ busy-state monitor (rate-limited) ─▶ swap attempt at Level3
//!     ├─ core-sparing cycle (rate-limited, one CPU per interval)
//!     ├─ drain if this CPU was spared
//!     └─ active push
//! ```

use crate::balance::migrate::{self, MigrationWork};
use crate::balance::{active_push, idle_pull, misfit, PullOutcome};
use crate::config::HmpConfig;
use crate::context::SchedContext;
use crate::cpu::{CpuArena, CpuRecord};
use crate::cpumask::CpuMask;
use crate::domain::DomainSet;
use crate::ecs::{CoreSparing, Governor, RequestKind};
use crate::host::{HostOps, MaskListener, SysbusyListener};
use crate::metrics::HmpMetrics;
use crate::mlt::{LoadTracker, UarchSnapshot};
use crate::sysbusy::{somac, SysbusyMonitor, SysbusyState};
use crate::task::{TaskInfo, TaskRecord, TaskTable};
use crate::workqueue::{DeferredQueue, DeferredWork};
use crate::{CpuId, HmpError, HmpResult, TaskId};
use alloc::sync::Arc;
use alloc::vec::Vec;
use bitflags::bitflags;
use core::fmt;
use spin::RwLock;

bitflags! {
    /// Why a task is being enqueued
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EnqueueFlags: u32 {
        /// Task woke up
        const WAKEUP = 1 << 0;
        /// Task was just created
        const NEW = 1 << 1;
    }
}

/// The scheduling extension
pub struct HmpEngine {
    config: HmpConfig,
    host: Arc<dyn HostOps>,
    cpus: CpuArena,
    domains: DomainSet,
    tasks: TaskTable,
    tracker: LoadTracker,
    /// `None` if the governor could not be set up
    ecs: Option<CoreSparing>,
    sysbusy: SysbusyMonitor,
    deferred: DeferredQueue,
    metrics: HmpMetrics,
    sysbusy_listeners: RwLock<Vec<Arc<dyn SysbusyListener>>>,
    mask_listeners: RwLock<Vec<Arc<dyn MaskListener>>>,
}

impl fmt::Debug for HmpEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmpEngine")
            .field("cpus", &self.cpus.len())
            .field("domains", &self.domains.len())
            .field("tasks", &self.tasks.count())
            .field("sysbusy", &self.sysbusy.state())
            .field("schedulable", &self.schedulable_cpus())
            .finish_non_exhaustive()
    }
}

impl HmpEngine {
    /// Validate the topology and build every service
    pub fn new(config: HmpConfig, host: Arc<dyn HostOps>, now: u64) -> HmpResult<Self> {
        config.validate()?;

        let tracker = LoadTracker::new(config.mlt.clone());
        let domains = DomainSet::new(&config.topology);

        let nr_cpus = config.nr_cpus();
        let mut records = Vec::new();
        records
            .try_reserve_exact(nr_cpus)
            .map_err(|_| HmpError::OutOfResources)?;
        for id in 0..nr_cpus as u32 {
            let cpu = CpuId::new(id);
            let domain = domains.of_cpu(cpu).ok_or(HmpError::InvalidTopology)?;
            records.push(CpuRecord::new(
                cpu,
                domain.index(),
                domain.capacity(),
                domain.exit_latency_ns(),
                &tracker,
                now,
            ));
        }
        let cpus = CpuArena::new(records)?;

        let ecs = match CoreSparing::new(&config, &domains, now) {
            Ok(ecs) => Some(ecs),
            Err(err) => {
                log::warn!("[hmp] core sparing unavailable: {}", err);
                None
            }
        };

        log::info!(
            "[hmp] {} cpus in {} domains, governor {}",
            nr_cpus,
            domains.len(),
            if ecs.as_ref().is_some_and(|e| e.governor().is_enabled()) { "on" } else { "off" }
        );

        Ok(Self {
            config,
            host,
            cpus,
            domains,
            tasks: TaskTable::new(),
            tracker,
            ecs,
            sysbusy: SysbusyMonitor::new(now),
            deferred: DeferredQueue::new(),
            metrics: HmpMetrics::new(),
            sysbusy_listeners: RwLock::new(Vec::new()),
            mask_listeners: RwLock::new(Vec::new()),
        })
    }

    /// Borrow every service at once
    pub fn ctx(&self) -> SchedContext<'_> {
        SchedContext {
            config: &self.config,
            cpus: &self.cpus,
            domains: &self.domains,
            tasks: &self.tasks,
            tracker: &self.tracker,
            host: self.host.as_ref(),
            deferred: &self.deferred,
            metrics: &self.metrics,
            sysbusy: &self.sysbusy,
        }
    }

    // =========================================================================
    // Task lifecycle
    // =========================================================================

    /// Start tracking a task
    pub fn register_task(&self, info: TaskInfo, now: u64) -> HmpResult<Arc<TaskRecord>> {
        let task = Arc::new(TaskRecord::new(&info, self.tracker.new_task_window(now)));
        self.tasks.register(task.clone())?;
        log::trace!("[hmp] registered task {}", info.id.raw());
        Ok(task)
    }

    /// Stop tracking a task, detaching it from its CPU
    pub fn unregister_task(&self, id: TaskId, now: u64) -> HmpResult<()> {
        let task = self.tasks.unregister(id)?;
        if let Some(cpu) = task.cpu().and_then(|c| self.cpus.get(c)) {
            migrate::detach_task(&self.ctx(), &task, cpu, now);
        }
        task.set_cpu(None);
        Ok(())
    }

    /// New utilization estimate from the host
    pub fn set_task_util(&self, id: TaskId, util: u32) -> HmpResult<()> {
        let task = self.tasks.get(id).ok_or(HmpError::TaskNotFound)?;
        task.set_util(util);
        // Retry once if the task moved while the lock was being taken
        for _ in 0..2 {
            let Some(cpu) = task.cpu().and_then(|c| self.cpus.get(c)) else {
                break;
            };
            let rq = cpu.rq.lock();
            if rq.contains(&task) {
                cpu.publish(&rq);
                misfit::update_locked(&self.ctx(), &task, cpu, &rq);
                break;
            }
        }
        Ok(())
    }

    /// Frequency change on a CPU
    pub fn set_cpu_capacity(&self, cpu: CpuId, capacity: u32) -> HmpResult<()> {
        let cpu = self.cpus.get(cpu).ok_or(HmpError::CpuNotFound)?;
        cpu.set_capacity_cur(capacity);
        Ok(())
    }

    // =========================================================================
    // Scheduler hooks
    // =========================================================================

    /// A task was enqueued on `cpu`
    pub fn enqueue(&self, cpu: CpuId, task: TaskId, flags: EnqueueFlags, now: u64) {
        let (Some(cpu), Some(task)) = (self.cpus.get(cpu), self.tasks.get(task)) else {
            return;
        };
        let ctx = self.ctx();

        if let Some(prev) = task.cpu().filter(|&c| c != cpu.id()).and_then(|c| self.cpus.get(c)) {
            log::trace!("[hmp] task {} enqueued without dequeue", task.id().raw());
            migrate::detach_task(&ctx, &task, prev, now);
        }
        if flags.contains(EnqueueFlags::WAKEUP) {
            task.set_last_woken(now);
            if let Some(ecs) = &self.ecs {
                ecs.wakeup_fast_path(&ctx, &task, cpu);
            }
        }
        migrate::attach_task(&ctx, &task, cpu, now);
    }

    /// A task left `cpu`'s run queue
    pub fn dequeue(&self, cpu: CpuId, task: TaskId, now: u64) {
        let (Some(cpu), Some(task)) = (self.cpus.get(cpu), self.tasks.get(task)) else {
            return;
        };
        if migrate::detach_task(&self.ctx(), &task, cpu, now) {
            task.set_cpu(None);
        }
    }

    /// `cpu` switched from `prev` to `next` (`None` = idle)
    pub fn context_switch(&self, cpu: CpuId, prev: Option<TaskId>, next: Option<TaskId>, now: u64) {
        let Some(cpu) = self.cpus.get(cpu) else {
            return;
        };
        let prev = prev.and_then(|id| self.tasks.get(id));
        let next = next.and_then(|id| self.tasks.get(id));

        let mut rq = cpu.rq.lock();
        if let Some(prev) = &prev {
            self.tracker.task_state_change(prev, false, now);
        }
        let next = next.filter(|t| rq.contains(t));
        rq.current = next.clone();
        if let Some(next) = &next {
            self.tracker.task_state_change(next, true, now);
        }
        self.tracker.cpu_state_change(cpu, next.is_some(), now);
    }

    /// Periodic tick on `cpu`
    pub fn tick(&self, cpu: CpuId, now: u64) {
        let Some(record) = self.cpus.get(cpu) else {
            return;
        };
        let ctx = self.ctx();

        self.tracker.update_cpu(record, now);
        if let Some(current) = record.current() {
            self.tracker.update_task(&current, now);
            misfit::update_task(&ctx, &current, record);
        }
        if self.config.mlt.uarch {
            if let Some(snapshot) = self.host.read_uarch(cpu) {
                self.tracker.record_uarch(record, now, snapshot);
            }
        }

        self.sysbusy.update(&ctx, now);
        if self.sysbusy.state() == SysbusyState::Level3 {
            somac::attempt(&ctx, now);
        }

        if let Some(ecs) = &self.ecs {
            ecs.update(&ctx, now);
        }

        if !record.is_schedulable() && record.nr_running() > 0 {
            migrate::dispatch(record, MigrationWork::Drain { src: cpu });
        }

        active_push::check(&ctx, cpu);
    }

    /// `cpu` is about to go idle
    pub fn idle_balance(&self, cpu: CpuId, now: u64) -> PullOutcome {
        idle_pull::idle_balance(&self.ctx(), cpu, now)
    }

    /// Run migration work queued on `cpu`
    pub fn run_stopper(&self, cpu: CpuId, now: u64) -> usize {
        match self.cpus.get(cpu) {
            Some(record) => migrate::run_stopper(&self.ctx(), record, now),
            None => 0,
        }
    }

    /// Drain deferred work; returns the number of items run
    pub fn run_deferred(&self, now: u64) -> usize {
        let ctx = self.ctx();
        let mut ran = 0;
        while let Some(work) = self.deferred.pop() {
            match work {
                DeferredWork::SomacFinish(desc) => {
                    somac::finish(&ctx, &desc, now);
                }
                DeferredWork::SysbusyChanged { old, new } => {
                    let listeners = self.sysbusy_listeners.read().clone();
                    for listener in listeners {
                        listener.on_sysbusy_change(old, new);
                    }
                }
                DeferredWork::MaskChanged(mask) => {
                    let listeners = self.mask_listeners.read().clone();
                    for listener in listeners {
                        listener.on_schedulable_change(mask);
                    }
                }
            }
            ran += 1;
        }
        ran
    }

    /// Fold a hardware counter read taken outside the tick
    pub fn record_uarch(&self, cpu: CpuId, snapshot: UarchSnapshot, now: u64) {
        if let Some(record) = self.cpus.get(cpu) {
            self.tracker.record_uarch(record, now, snapshot);
        }
    }

    // =========================================================================
    // Core sparing
    // =========================================================================

    /// Published schedulable set
    pub fn schedulable_cpus(&self) -> CpuMask {
        self.ecs
            .as_ref()
            .map_or_else(|| self.cpus.all(), CoreSparing::schedulable)
    }

    /// Enable or disable the governor
    pub fn set_governor_enabled(&self, enabled: bool) -> HmpResult<()> {
        let ecs = self.ecs.as_ref().ok_or(HmpError::OutOfResources)?;
        ecs.set_enabled(&self.ctx(), enabled);
        Ok(())
    }

    /// Add or re-reference a named CPU-set request
    pub fn register_request(&self, name: &str, kind: RequestKind, mask: CpuMask) -> HmpResult<()> {
        let ecs = self.ecs.as_ref().ok_or(HmpError::OutOfResources)?;
        ecs.register_request(&self.ctx(), name, kind, mask)
    }

    /// Change a request's mask
    pub fn update_request(&self, name: &str, kind: RequestKind, mask: CpuMask) -> HmpResult<()> {
        let ecs = self.ecs.as_ref().ok_or(HmpError::OutOfResources)?;
        ecs.update_request(&self.ctx(), name, kind, mask)
    }

    /// Drop a request reference
    pub fn unregister_request(&self, name: &str, kind: RequestKind) -> HmpResult<()> {
        let ecs = self.ecs.as_ref().ok_or(HmpError::RequestNotFound)?;
        ecs.unregister_request(&self.ctx(), name, kind)
    }

    // =========================================================================
    // Listeners and accessors
    // =========================================================================

    /// Subscribe to busy-level changes
    pub fn add_sysbusy_listener(&self, listener: Arc<dyn SysbusyListener>) {
        self.sysbusy_listeners.write().push(listener);
    }

    /// Subscribe to schedulable-set changes
    pub fn add_mask_listener(&self, listener: Arc<dyn MaskListener>) {
        self.mask_listeners.write().push(listener);
    }

    /// Current busy level
    pub fn sysbusy_state(&self) -> SysbusyState {
        self.sysbusy.state()
    }

    /// Configuration
    pub fn config(&self) -> &HmpConfig {
        &self.config
    }

    /// Event counters
    pub fn metrics(&self) -> &HmpMetrics {
        &self.metrics
    }

    /// Load tracker
    pub fn tracker(&self) -> &LoadTracker {
        &self.tracker
    }

    /// Domain chain
    pub fn domains(&self) -> &DomainSet {
        &self.domains
    }

    /// CPU record
    pub fn cpu(&self, id: CpuId) -> Option<&CpuRecord> {
        self.cpus.get(id)
    }

    /// Task record
    pub fn task(&self, id: TaskId) -> Option<Arc<TaskRecord>> {
        self.tasks.get(id)
    }

    /// Core sparing, if set up
    pub fn core_sparing(&self) -> Option<&CoreSparing> {
        self.ecs.as_ref()
    }

    /// Governor, if set up
    pub fn governor(&self) -> Option<&Governor> {
        self.ecs.as_ref().map(CoreSparing::governor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use crate::NSEC_PER_MSEC;
    use core::sync::atomic::{AtomicUsize, Ordering};

    const PERIOD: u64 = 4 * NSEC_PER_MSEC;

    #[test]
    fn test_rejects_bad_topology() {
        let config = HmpConfig::new(Vec::new());
        let host = Arc::new(crate::testing::RecordingHost::default());
        assert!(matches!(HmpEngine::new(config, host, 0), Err(HmpError::InvalidTopology)));
    }

    #[test]
    fn test_enqueue_dequeue_bookkeeping() {
        let f = Fixture::new(HmpConfig::big_little(2, 2).without_governor());
        let task = f.add_task(1, 900);
        let cpu = f.engine.cpu(CpuId::new(0)).unwrap();

        f.engine.enqueue(CpuId::new(0), TaskId::new(1), EnqueueFlags::WAKEUP, 5);
        assert_eq!(cpu.nr_running(), 1);
        assert_eq!(cpu.cfs_util(), 900);
        assert_eq!(cpu.misfit_count(), 1);
        assert_eq!(task.last_woken(), 5);

        f.engine.dequeue(CpuId::new(0), TaskId::new(1), 6);
        assert_eq!(cpu.nr_running(), 0);
        assert_eq!(cpu.misfit_count(), 0);
        assert_eq!(task.cpu(), None);

        // Unknown ids are ignored
        f.engine.enqueue(CpuId::new(9), TaskId::new(1), EnqueueFlags::empty(), 7);
        f.engine.dequeue(CpuId::new(0), TaskId::new(77), 7);
    }

    #[test]
    fn test_util_change_reclassifies() {
        let f = Fixture::new(HmpConfig::big_little(2, 2).without_governor());
        f.run(1, 100, 0, 0);
        let cpu = f.engine.cpu(CpuId::new(0)).unwrap();
        assert_eq!(cpu.misfit_count(), 0);

        f.engine.set_task_util(TaskId::new(1), 800).unwrap();
        assert_eq!(cpu.misfit_count(), 1);
        assert_eq!(cpu.util(), 800);
        assert_eq!(f.engine.set_task_util(TaskId::new(5), 1), Err(HmpError::TaskNotFound));
    }

    #[test]
    fn test_oversized_util_saturates() {
        let f = Fixture::new(HmpConfig::big_little(2, 2).without_governor());
        f.run(1, 1024, 2, 0);
        f.run(2, 1024, 2, 0);

        f.engine.set_task_util(TaskId::new(2), u32::MAX).unwrap();
        let cpu = f.engine.cpu(CpuId::new(2)).unwrap();
        assert_eq!(f.engine.task(TaskId::new(2)).unwrap().util(), 1024);
        assert_eq!(cpu.cfs_util(), 2048);
    }

    #[test]
    fn test_unregister_detaches() {
        let f = Fixture::new(HmpConfig::big_little(2, 2).without_governor());
        f.run(1, 900, 0, 0);
        f.engine.unregister_task(TaskId::new(1), 1).unwrap();

        let cpu = f.engine.cpu(CpuId::new(0)).unwrap();
        assert_eq!(cpu.nr_running(), 0);
        assert_eq!(cpu.misfit_count(), 0);
        assert!(cpu.current().is_none());
    }

    #[test]
    fn test_misfit_pulled_by_idle_big_cpu() {
        let f = Fixture::new(HmpConfig::big_little(2, 2).without_governor());
        let task = f.run(1, 900, 0, 0);
        let little = f.engine.cpu(CpuId::new(0)).unwrap();
        assert!(task.is_misfit());
        assert_eq!(little.misfit_count(), 1);

        let outcome = f.engine.idle_balance(CpuId::new(2), 1);
        assert_eq!(outcome, PullOutcome::Dispatched { task: TaskId::new(1), src: CpuId::new(0) });

        assert_eq!(f.engine.run_stopper(CpuId::new(0), 2), 1);
        assert_eq!(task.cpu(), Some(CpuId::new(2)));
        assert_eq!(little.misfit_count(), 0);
        assert!(!little.active_balance());
        assert!(!task.is_misfit());
        assert_eq!(f.host.moves(), alloc::vec![(TaskId::new(1), CpuId::new(0), CpuId::new(2))]);
    }

    #[test]
    fn test_tick_pushes_misfit() {
        let f = Fixture::new(HmpConfig::big_little(2, 2).without_governor());
        let task = f.run(1, 900, 1, 0);

        f.engine.tick(CpuId::new(1), PERIOD);
        assert!(f.engine.cpu(CpuId::new(1)).unwrap().active_balance());
        f.engine.run_stopper(CpuId::new(1), PERIOD);
        assert_eq!(task.cpu(), Some(CpuId::new(2)));
        assert_eq!(f.engine.metrics().snapshot().active_pushes, 1);
    }

    #[test]
    fn test_governor_spares_idle_domain() {
        let f = Fixture::new(HmpConfig::big_little(2, 2));
        let threshold = f.engine.config().ecs.close_threshold as u64;

        // Idle system: big domain closes down to nothing, little keeps one
        for i in 1..=(4 * threshold) {
            f.engine.tick(CpuId::new(0), i * PERIOD);
        }
        assert_eq!(f.engine.schedulable_cpus(), CpuMask::from_cpus(&[0]));
        assert!(!f.engine.cpu(CpuId::new(3)).unwrap().is_schedulable());
        assert!(f.engine.metrics().snapshot().cores_closed >= 3);
    }

    #[test]
    fn test_governor_opens_at_once_closes_after_hysteresis() {
        let mut config = HmpConfig::big_little(4, 4);
        config.topology[0].busy_ratio = 400;
        let f = Fixture::new(config);

        // 960 util on the little domain: over-utilized with three or four CPUs open
        for (id, cpu) in [(1, 0), (2, 1), (3, 2)] {
            f.run(id, 240, cpu, 0);
        }
        f.add_task(4, 240);
        f.engine.enqueue(CpuId::new(0), TaskId::new(4), EnqueueFlags::empty(), 0);

        let ecs = f.engine.core_sparing().unwrap();
        let governor = ecs.governor();
        governor.with_state(0, |s| s.open = CpuMask::from_cpus(&[0, 1, 2]));
        ecs.recompute(&f.engine.ctx());
        let little = |g: &Governor| g.domain_state(0).unwrap();

        // Four overloaded cycles: the closed CPU opens on the first one
        f.engine.tick(CpuId::new(0), PERIOD);
        assert_eq!(little(governor).open, CpuMask::first_n(4));
        assert_eq!(f.engine.metrics().snapshot().cores_opened, 1);
        for i in 2..=4 {
            f.engine.tick(CpuId::new(0), i * PERIOD);
            let state = little(governor);
            assert!(state.flags.is_overloaded());
            assert_eq!(state.close_count, 0);
            assert_eq!(state.open, CpuMask::first_n(4));
        }

        for id in 1..=4 {
            f.engine.set_task_util(TaskId::new(id), 10).unwrap();
        }

        // Five quiet cycles hold, the sixth closes the highest CPU
        for i in 5..=9 {
            f.engine.tick(CpuId::new(0), i * PERIOD);
            let state = little(governor);
            assert!(!state.flags.is_overloaded());
            assert_eq!(state.open, CpuMask::first_n(4));
        }
        f.engine.tick(CpuId::new(0), 10 * PERIOD);
        assert_eq!(little(governor).open, CpuMask::from_cpus(&[0, 1, 2]));
        assert!(!f.engine.cpu(CpuId::new(3)).unwrap().is_schedulable());
    }

    #[test]
    fn test_governor_disabled_keeps_all() {
        let f = Fixture::new(HmpConfig::big_little(2, 2));
        f.engine.set_governor_enabled(false).unwrap();
        for i in 1..=40 {
            f.engine.tick(CpuId::new(0), i * PERIOD);
        }
        assert_eq!(f.engine.schedulable_cpus(), CpuMask::first_n(4));
    }

    #[test]
    fn test_deferred_notifies_listeners() {
        struct Counter(AtomicUsize);
        impl MaskListener for Counter {
            fn on_schedulable_change(&self, _mask: CpuMask) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        impl SysbusyListener for Counter {
            fn on_sysbusy_change(&self, _old: SysbusyState, _new: SysbusyState) {
                self.0.fetch_add(10, Ordering::SeqCst);
            }
        }

        let f = Fixture::new(HmpConfig::big_little(2, 2));
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        f.engine.add_mask_listener(counter.clone());
        f.engine.add_sysbusy_listener(counter.clone());

        f.engine
            .register_request("cap", RequestKind::Max, CpuMask::from_cpus(&[0, 1]))
            .unwrap();
        let ctx = f.engine.ctx();
        ctx.sysbusy.transition(&ctx, SysbusyState::Level1, 1);

        assert_eq!(f.engine.run_deferred(2), 2);
        assert_eq!(counter.0.load(Ordering::SeqCst), 11);
        assert_eq!(f.engine.run_deferred(3), 0);
    }

    #[test]
    fn test_context_switch_tracks_activity() {
        let f = Fixture::new(HmpConfig::big_little(1, 1).without_governor());
        f.run(1, 100, 0, 0);
        let cpu = f.engine.cpu(CpuId::new(0)).unwrap();
        assert_eq!(f.engine.tracker().cpu_active_ratio(cpu, 8 * PERIOD), 1024);

        f.engine.context_switch(CpuId::new(0), Some(TaskId::new(1)), None, 8 * PERIOD);
        assert!(cpu.current().is_none());
        assert_eq!(f.engine.tracker().cpu_active_ratio(cpu, 16 * PERIOD), 0);

        // A task not enqueued here cannot become current
        f.add_task(2, 100);
        f.engine.context_switch(CpuId::new(0), None, Some(TaskId::new(2)), 17 * PERIOD);
        assert!(cpu.current().is_none());
    }

    #[test]
    fn test_cpu_capacity() {
        let f = Fixture::new(HmpConfig::big_little(1, 1));
        f.engine.set_cpu_capacity(CpuId::new(1), 512).unwrap();
        assert_eq!(f.engine.cpu(CpuId::new(1)).unwrap().capacity_cur(), 512);
        assert_eq!(f.engine.set_cpu_capacity(CpuId::new(5), 512), Err(HmpError::CpuNotFound));
    }
}
