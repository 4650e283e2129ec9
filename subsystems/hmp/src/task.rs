//! # Task Records
//!
//! Per-task state the engine keeps alongside the host's own task structure,
//! and the table that owns it. Records are created by `register_task` and
//! dropped by `unregister_task`.

use crate::cpumask::CpuMask;
use crate::mlt::LoadWindow;
use crate::{CpuId, HmpError, HmpResult, TaskId, SCHED_CAPACITY_SCALE};
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use spin::{Mutex, RwLock};

const NO_CPU: u32 = u32::MAX;

/// Registration parameters for a task
#[derive(Debug, Clone)]
pub struct TaskInfo {
    /// Host task id
    pub id: TaskId,
    /// Estimated utilization (0..=1024)
    pub util: u32,
    /// CPUs the task may run on
    pub allowed: CpuMask,
    /// Real-time scheduling class
    pub rt: bool,
    /// High-priority task that should stay where it is
    pub pinned: bool,
    /// Migration temporarily forbidden
    pub migration_disabled: bool,
}

impl TaskInfo {
    /// Fair-class task allowed everywhere
    pub fn new(id: TaskId, util: u32) -> Self {
        Self {
            id,
            util,
            allowed: CpuMask::first_n(crate::MAX_CPUS),
            rt: false,
            pinned: false,
            migration_disabled: false,
        }
    }

    /// Restrict affinity
    pub fn with_allowed(mut self, allowed: CpuMask) -> Self {
        self.allowed = allowed;
        self
    }

    /// Real-time class
    pub fn rt(mut self) -> Self {
        self.rt = true;
        self
    }

    /// Priority-pinned
    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    /// Migration disabled
    pub fn migration_disabled(mut self) -> Self {
        self.migration_disabled = true;
        self
    }
}

/// Engine-side task state
#[derive(Debug)]
pub struct TaskRecord {
    /// Task ID
    id: TaskId,
    /// Estimated utilization, supplied by the host
    util: AtomicU32,
    /// Counted in its CPU's misfit counter
    misfit: AtomicBool,
    /// Flagged heavy by the last busy-state profile
    heavy: AtomicBool,
    /// Real-time class
    rt: bool,
    /// Priority-pinned
    pinned: AtomicBool,
    /// Migration disabled
    migration_disabled: AtomicBool,
    /// Allowed CPU set
    allowed: AtomicU64,
    /// CPU the task is enqueued on
    cpu: AtomicU32,
    /// Last enqueue timestamp
    enqueued_at: AtomicU64,
    /// Last wakeup timestamp
    last_woken: AtomicU64,
    /// Active-ratio window
    pub(crate) load: Mutex<LoadWindow>,
}

impl TaskRecord {
    /// Create a record with a fresh window
    pub fn new(info: &TaskInfo, window: LoadWindow) -> Self {
        Self {
            id: info.id,
            util: AtomicU32::new(info.util.min(SCHED_CAPACITY_SCALE)),
            misfit: AtomicBool::new(false),
            heavy: AtomicBool::new(false),
            rt: info.rt,
            pinned: AtomicBool::new(info.pinned),
            migration_disabled: AtomicBool::new(info.migration_disabled),
            allowed: AtomicU64::new(info.allowed.bits()),
            cpu: AtomicU32::new(NO_CPU),
            enqueued_at: AtomicU64::new(0),
            last_woken: AtomicU64::new(0),
            load: Mutex::new(window),
        }
    }

    /// Task ID
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Estimated utilization
    pub fn util(&self) -> u32 {
        self.util.load(Ordering::Relaxed)
    }

    /// Clamped to [`SCHED_CAPACITY_SCALE`]
    pub(crate) fn set_util(&self, util: u32) {
        self.util.store(util.min(SCHED_CAPACITY_SCALE), Ordering::Relaxed);
    }

    /// Misfit flag
    pub fn is_misfit(&self) -> bool {
        self.misfit.load(Ordering::Acquire)
    }

    /// Swap the misfit flag, returning the previous value
    pub(crate) fn swap_misfit(&self, misfit: bool) -> bool {
        self.misfit.swap(misfit, Ordering::AcqRel)
    }

    /// Heavy flag
    pub fn is_heavy(&self) -> bool {
        self.heavy.load(Ordering::Relaxed)
    }

    pub(crate) fn set_heavy(&self, heavy: bool) {
        self.heavy.store(heavy, Ordering::Relaxed);
    }

    /// Real-time class?
    pub fn is_rt(&self) -> bool {
        self.rt
    }

    /// Priority-pinned?
    pub fn is_pinned(&self) -> bool {
        self.pinned.load(Ordering::Relaxed)
    }

    /// Update the priority-pinned flag
    pub fn set_pinned(&self, pinned: bool) {
        self.pinned.store(pinned, Ordering::Relaxed);
    }

    /// Migration disabled?
    pub fn is_migration_disabled(&self) -> bool {
        self.migration_disabled.load(Ordering::Acquire)
    }

    /// Update the migration-disabled flag
    pub fn set_migration_disabled(&self, disabled: bool) {
        self.migration_disabled.store(disabled, Ordering::Release);
    }

    /// Allowed CPUs
    pub fn allowed(&self) -> CpuMask {
        CpuMask::from_bits(self.allowed.load(Ordering::Relaxed))
    }

    /// Update affinity
    pub fn set_allowed(&self, allowed: CpuMask) {
        self.allowed.store(allowed.bits(), Ordering::Relaxed);
    }

    /// May the task run on `cpu`?
    pub fn can_run_on(&self, cpu: CpuId) -> bool {
        self.allowed().contains(cpu)
    }

    /// May the task be moved to `dst` right now?
    pub fn can_migrate_to(&self, dst: CpuId) -> bool {
        !self.is_migration_disabled() && self.can_run_on(dst)
    }

    /// CPU the task is enqueued on
    pub fn cpu(&self) -> Option<CpuId> {
        match self.cpu.load(Ordering::Acquire) {
            NO_CPU => None,
            raw => Some(CpuId::new(raw)),
        }
    }

    pub(crate) fn set_cpu(&self, cpu: Option<CpuId>) {
        let raw = cpu.map_or(NO_CPU, CpuId::raw);
        self.cpu.store(raw, Ordering::Release);
    }

    /// Last enqueue timestamp
    pub fn enqueued_at(&self) -> u64 {
        self.enqueued_at.load(Ordering::Relaxed)
    }

    pub(crate) fn set_enqueued_at(&self, now: u64) {
        self.enqueued_at.store(now, Ordering::Relaxed);
    }

    /// Time spent on the current CPU
    pub fn residency(&self, now: u64) -> u64 {
        now.saturating_sub(self.enqueued_at())
    }

    /// Last wakeup timestamp
    pub fn last_woken(&self) -> u64 {
        self.last_woken.load(Ordering::Relaxed)
    }

    pub(crate) fn set_last_woken(&self, now: u64) {
        self.last_woken.store(now, Ordering::Relaxed);
    }
}

/// Table of registered tasks
#[derive(Debug)]
pub struct TaskTable {
    tasks: RwLock<BTreeMap<TaskId, Arc<TaskRecord>>>,
}

impl TaskTable {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            tasks: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a task
    pub fn register(&self, task: Arc<TaskRecord>) -> HmpResult<()> {
        let id = task.id();
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&id) {
            return Err(HmpError::AlreadyExists);
        }
        tasks.insert(id, task);
        Ok(())
    }

    /// Unregister a task
    pub fn unregister(&self, id: TaskId) -> HmpResult<Arc<TaskRecord>> {
        self.tasks.write().remove(&id).ok_or(HmpError::TaskNotFound)
    }

    /// Get a task by ID
    pub fn get(&self, id: TaskId) -> Option<Arc<TaskRecord>> {
        self.tasks.read().get(&id).cloned()
    }

    /// Number of registered tasks
    pub fn count(&self) -> usize {
        self.tasks.read().len()
    }

    /// Snapshot of all tasks
    pub fn all(&self) -> Vec<Arc<TaskRecord>> {
        self.tasks.read().values().cloned().collect()
    }

    /// Visit every task under the read lock
    pub fn for_each<F: FnMut(&Arc<TaskRecord>)>(&self, mut f: F) {
        for task in self.tasks.read().values() {
            f(task);
        }
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64) -> Arc<TaskRecord> {
        let info = TaskInfo::new(TaskId::new(id), 100);
        Arc::new(TaskRecord::new(&info, LoadWindow::new(4_000_000, 0)))
    }

    #[test]
    fn test_register_unregister() {
        let table = TaskTable::new();
        table.register(record(1)).unwrap();
        table.register(record(2)).unwrap();
        assert_eq!(table.register(record(1)), Err(HmpError::AlreadyExists));
        assert_eq!(table.count(), 2);

        table.unregister(TaskId::new(1)).unwrap();
        assert!(table.get(TaskId::new(1)).is_none());
        assert!(matches!(
            table.unregister(TaskId::new(1)),
            Err(HmpError::TaskNotFound)
        ));
    }

    #[test]
    fn test_cpu_placement() {
        let task = record(1);
        assert_eq!(task.cpu(), None);
        task.set_cpu(Some(CpuId::new(3)));
        assert_eq!(task.cpu(), Some(CpuId::new(3)));
        task.set_cpu(None);
        assert_eq!(task.cpu(), None);
    }

    #[test]
    fn test_util_clamped() {
        let info = TaskInfo::new(TaskId::new(1), u32::MAX);
        let task = TaskRecord::new(&info, LoadWindow::new(4_000_000, 0));
        assert_eq!(task.util(), SCHED_CAPACITY_SCALE);

        task.set_util(300);
        assert_eq!(task.util(), 300);
        task.set_util(5000);
        assert_eq!(task.util(), SCHED_CAPACITY_SCALE);
    }

    #[test]
    fn test_migration_gates() {
        let info = TaskInfo::new(TaskId::new(1), 100)
            .with_allowed(CpuMask::from_cpus(&[0, 1]));
        let task = TaskRecord::new(&info, LoadWindow::new(4_000_000, 0));

        assert!(task.can_migrate_to(CpuId::new(1)));
        assert!(!task.can_migrate_to(CpuId::new(2)));

        task.set_migration_disabled(true);
        assert!(!task.can_migrate_to(CpuId::new(1)));
    }

    #[test]
    fn test_residency() {
        let task = record(1);
        task.set_enqueued_at(1_000);
        assert_eq!(task.residency(5_000), 4_000);
        assert_eq!(task.residency(10), 0);
    }
}
