//! # Host Interface
//!
//! The narrow seam between the engine and the host scheduler that owns the
//! real run queues.
//!
//! ## Ownership of placement
//!
//! When the engine moves a task itself (idle pull, stopper work, swap), it
//! asks the host to perform the physical move and then updates its own
//! run-queue views. The host must not report such a move back through
//! `enqueue`/`dequeue`. Every other placement change goes through the hooks.

use crate::cpumask::CpuMask;
use crate::mlt::UarchSnapshot;
use crate::sysbusy::SysbusyState;
use crate::task::TaskRecord;
use crate::CpuId;

/// Operations the engine asks of the host scheduler
pub trait HostOps: Send + Sync {
    /// Move `task` from `src` to `dst`
    ///
    /// Returns false if the host refused (e.g. the task is no longer on
    /// `src`). The engine drops the request silently in that case.
    fn move_task(&self, task: &TaskRecord, src: CpuId, dst: CpuId) -> bool;

    /// Exchange two running tasks between their CPUs
    fn swap_running(&self, a: &TaskRecord, a_cpu: CpuId, b: &TaskRecord, b_cpu: CpuId) -> bool;

    /// Read the cumulative hardware counters of `cpu`
    ///
    /// Hosts without counter access keep the default.
    fn read_uarch(&self, _cpu: CpuId) -> Option<UarchSnapshot> {
        None
    }
}

/// Busy-state change notification
pub trait SysbusyListener: Send + Sync {
    /// The global busy level changed
    fn on_sysbusy_change(&self, old: SysbusyState, new: SysbusyState);
}

/// Schedulable-set change notification
pub trait MaskListener: Send + Sync {
    /// The published schedulable CPU set changed
    fn on_schedulable_change(&self, mask: CpuMask);
}
