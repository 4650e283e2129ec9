//! # CPU Records
//!
//! One record per CPU, allocated once at init in a fixed arena indexed by
//! CPU id. Records are never freed while the engine exists.

use crate::balance::migrate::Stopper;
use crate::cpumask::CpuMask;
use crate::mlt::{LoadTracker, LoadWindow, NrRunTracker};
use crate::task::TaskRecord;
use crate::{CpuId, HmpError, HmpResult};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use spin::Mutex;

/// The host's run queue as seen by the engine
///
/// Bookkeeping only: the engine never orders these tasks.
#[derive(Debug, Default)]
pub struct RunqueueView {
    /// Tasks enqueued on the CPU, including the running one
    pub(crate) tasks: Vec<Arc<TaskRecord>>,
    /// Task currently executing
    pub(crate) current: Option<Arc<TaskRecord>>,
}

impl RunqueueView {
    /// Number of enqueued tasks
    pub fn nr_running(&self) -> usize {
        self.tasks.len()
    }

    /// Running task
    pub fn current(&self) -> Option<&Arc<TaskRecord>> {
        self.current.as_ref()
    }

    /// Enqueued tasks
    pub fn tasks(&self) -> &[Arc<TaskRecord>] {
        &self.tasks
    }

    /// Is the task enqueued here?
    pub fn contains(&self, task: &TaskRecord) -> bool {
        self.tasks.iter().any(|t| t.id() == task.id())
    }

    /// Enqueued tasks that are not running
    pub fn queued(&self) -> impl Iterator<Item = &Arc<TaskRecord>> {
        let current = self.current.as_ref().map(|c| c.id());
        self.tasks.iter().filter(move |t| Some(t.id()) != current)
    }

    pub(crate) fn insert(&mut self, task: Arc<TaskRecord>) -> bool {
        if self.contains(&task) {
            return false;
        }
        self.tasks.push(task);
        true
    }

    pub(crate) fn remove(&mut self, task: &TaskRecord) -> bool {
        let Some(pos) = self.tasks.iter().position(|t| t.id() == task.id()) else {
            return false;
        };
        self.tasks.swap_remove(pos);
        if self.current.as_ref().is_some_and(|c| c.id() == task.id()) {
            self.current = None;
        }
        true
    }

    /// Fair and real-time utilization sums
    pub(crate) fn util_sums(&self) -> (u32, u32) {
        self.tasks.iter().fold((0, 0), |(cfs, rt), t| {
            if t.is_rt() {
                (cfs, rt + t.util())
            } else {
                (cfs + t.util(), rt)
            }
        })
    }
}

/// Per-CPU record
pub struct CpuRecord {
    /// CPU ID
    id: CpuId,
    /// Index of the owning capacity domain
    domain: usize,
    /// Capacity at maximum frequency
    capacity_orig: u32,
    /// Capacity at the current frequency
    capacity_cur: AtomicU32,
    /// Idle-state exit latency (nanoseconds)
    exit_latency_ns: u32,
    /// Misfit tasks enqueued here
    misfit_count: AtomicU32,
    /// A migration from this CPU is in flight
    active_balance: AtomicBool,
    /// Member of the final schedulable set
    schedulable: AtomicBool,
    /// Mirror of the run queue length for lock-free readers
    nr_running: AtomicU32,
    /// Fair-class utilization sum
    cfs_util: AtomicU32,
    /// Real-time utilization sum
    rt_util: AtomicU32,
    /// Run queue view
    pub(crate) rq: Mutex<RunqueueView>,
    /// Active-ratio window
    pub(crate) load: Mutex<LoadWindow>,
    /// Runnable-count tracker
    pub(crate) nr_run: Mutex<NrRunTracker>,
    /// Fire-and-forget migration work executed on this CPU
    pub(crate) stopper: Stopper,
}

impl CpuRecord {
    /// Create a record
    pub fn new(
        id: CpuId,
        domain: usize,
        capacity: u32,
        exit_latency_ns: u32,
        tracker: &LoadTracker,
        now: u64,
    ) -> Self {
        Self {
            id,
            domain,
            capacity_orig: capacity,
            capacity_cur: AtomicU32::new(capacity),
            exit_latency_ns,
            misfit_count: AtomicU32::new(0),
            active_balance: AtomicBool::new(false),
            schedulable: AtomicBool::new(true),
            nr_running: AtomicU32::new(0),
            cfs_util: AtomicU32::new(0),
            rt_util: AtomicU32::new(0),
            rq: Mutex::new(RunqueueView::default()),
            load: Mutex::new(tracker.new_cpu_window(now)),
            nr_run: Mutex::new(tracker.new_nr_run(now)),
            stopper: Stopper::new(),
        }
    }

    /// CPU ID
    pub fn id(&self) -> CpuId {
        self.id
    }

    /// Owning domain index
    pub fn domain(&self) -> usize {
        self.domain
    }

    /// Capacity at maximum frequency
    pub fn capacity_orig(&self) -> u32 {
        self.capacity_orig
    }

    /// Capacity at the current frequency
    pub fn capacity_cur(&self) -> u32 {
        self.capacity_cur.load(Ordering::Relaxed)
    }

    /// Record a frequency change
    pub fn set_capacity_cur(&self, capacity: u32) {
        self.capacity_cur
            .store(capacity.min(self.capacity_orig), Ordering::Relaxed);
    }

    /// Idle exit latency
    pub fn exit_latency_ns(&self) -> u32 {
        self.exit_latency_ns
    }

    /// Misfit tasks enqueued here
    pub fn misfit_count(&self) -> u32 {
        self.misfit_count.load(Ordering::Acquire)
    }

    pub(crate) fn inc_misfit(&self) {
        self.misfit_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement, never below zero
    pub(crate) fn dec_misfit(&self) {
        let _ = self
            .misfit_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Is a migration from this CPU in flight?
    pub fn active_balance(&self) -> bool {
        self.active_balance.load(Ordering::Acquire)
    }

    /// Claim the in-flight slot; false if already claimed
    pub(crate) fn try_claim_active_balance(&self) -> bool {
        self.active_balance
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_active_balance(&self) {
        self.active_balance.store(false, Ordering::Release);
    }

    /// Member of the schedulable set?
    pub fn is_schedulable(&self) -> bool {
        self.schedulable.load(Ordering::Acquire)
    }

    pub(crate) fn set_schedulable(&self, schedulable: bool) {
        self.schedulable.store(schedulable, Ordering::Release);
    }

    /// Enqueued task count (stale snapshot)
    pub fn nr_running(&self) -> u32 {
        self.nr_running.load(Ordering::Relaxed)
    }

    /// No task enqueued
    pub fn is_idle(&self) -> bool {
        self.nr_running() == 0
    }

    /// Fair-class utilization
    pub fn cfs_util(&self) -> u32 {
        self.cfs_util.load(Ordering::Relaxed)
    }

    /// Real-time utilization
    pub fn rt_util(&self) -> u32 {
        self.rt_util.load(Ordering::Relaxed)
    }

    /// Combined fair + real-time utilization
    pub fn util(&self) -> u32 {
        self.cfs_util() + self.rt_util()
    }

    /// Running task
    pub fn current(&self) -> Option<Arc<TaskRecord>> {
        self.rq.lock().current.clone()
    }

    /// Copy of the enqueued task list
    pub fn tasks(&self) -> Vec<Arc<TaskRecord>> {
        self.rq.lock().tasks.clone()
    }

    /// Refresh the lock-free mirrors from the view; caller holds `rq`
    pub(crate) fn publish(&self, rq: &RunqueueView) {
        let (cfs, rt) = rq.util_sums();
        self.cfs_util.store(cfs, Ordering::Relaxed);
        self.rt_util.store(rt, Ordering::Relaxed);
        self.nr_running
            .store(rq.nr_running() as u32, Ordering::Relaxed);
    }
}

impl fmt::Debug for CpuRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuRecord")
            .field("id", &self.id)
            .field("domain", &self.domain)
            .field("capacity_orig", &self.capacity_orig)
            .field("nr_running", &self.nr_running())
            .field("misfit_count", &self.misfit_count())
            .field("active_balance", &self.active_balance())
            .field("schedulable", &self.is_schedulable())
            .finish()
    }
}

/// Fixed arena of CPU records indexed by CPU id
#[derive(Debug)]
pub struct CpuArena {
    cpus: Vec<CpuRecord>,
}

impl CpuArena {
    /// Allocate the arena once
    pub fn new(cpus: Vec<CpuRecord>) -> HmpResult<Self> {
        if cpus.iter().enumerate().any(|(i, c)| c.id().index() != i) {
            return Err(HmpError::InvalidTopology);
        }
        Ok(Self { cpus })
    }

    /// Look up a CPU
    pub fn get(&self, cpu: CpuId) -> Option<&CpuRecord> {
        self.cpus.get(cpu.index())
    }

    /// Number of CPUs
    pub fn len(&self) -> usize {
        self.cpus.len()
    }

    /// Is the arena empty?
    pub fn is_empty(&self) -> bool {
        self.cpus.is_empty()
    }

    /// All CPUs in id order
    pub fn iter(&self) -> impl Iterator<Item = &CpuRecord> {
        self.cpus.iter()
    }

    /// CPUs of a mask
    pub fn iter_mask(&self, mask: CpuMask) -> impl Iterator<Item = &CpuRecord> {
        mask.iter().filter_map(move |cpu| self.get(cpu))
    }

    /// Every CPU
    pub fn all(&self) -> CpuMask {
        CpuMask::first_n(self.cpus.len())
    }

    /// Current schedulable set, rebuilt from per-CPU flags
    pub fn schedulable(&self) -> CpuMask {
        self.cpus
            .iter()
            .filter(|c| c.is_schedulable())
            .map(CpuRecord::id)
            .collect()
    }

    /// Idle CPUs of a mask
    pub fn idle_in(&self, mask: CpuMask) -> CpuMask {
        self.iter_mask(mask)
            .filter(|c| c.is_idle())
            .map(CpuRecord::id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MltConfig;

    fn record(id: u32) -> CpuRecord {
        let tracker = LoadTracker::new(MltConfig::default());
        CpuRecord::new(CpuId::new(id), 0, 512, 0, &tracker, 0)
    }

    #[test]
    fn test_misfit_counter_saturates() {
        let cpu = record(0);
        cpu.dec_misfit();
        assert_eq!(cpu.misfit_count(), 0);

        cpu.inc_misfit();
        cpu.inc_misfit();
        cpu.dec_misfit();
        cpu.dec_misfit();
        cpu.dec_misfit();
        assert_eq!(cpu.misfit_count(), 0);
    }

    #[test]
    fn test_active_balance_claim() {
        let cpu = record(0);
        assert!(cpu.try_claim_active_balance());
        assert!(!cpu.try_claim_active_balance());
        cpu.release_active_balance();
        assert!(cpu.try_claim_active_balance());
    }

    #[test]
    fn test_capacity_cur_clamped() {
        let cpu = record(0);
        cpu.set_capacity_cur(2048);
        assert_eq!(cpu.capacity_cur(), 512);
        cpu.set_capacity_cur(100);
        assert_eq!(cpu.capacity_cur(), 100);
    }

    #[test]
    fn test_arena_rejects_misnumbered() {
        assert!(CpuArena::new(alloc::vec![record(0), record(2)]).is_err());
        let arena = CpuArena::new(alloc::vec![record(0), record(1)]).unwrap();
        assert_eq!(arena.all().count(), 2);
        assert_eq!(arena.schedulable(), arena.all());
        assert_eq!(arena.idle_in(arena.all()).count(), 2);
    }
}
