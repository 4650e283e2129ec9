//! # Deferred Work
//!
//! Work that must not run in the context that produced it (scheduler hooks
//! with run-queue locks held) is queued here and drained by the host from a
//! normal context through `HmpEngine::run_deferred`.

use crate::cpumask::CpuMask;
use crate::sysbusy::{SwapDescriptor, SysbusyState};
use alloc::collections::VecDeque;
use spin::Mutex;

/// A unit of deferred work
#[derive(Debug, Clone)]
pub enum DeferredWork {
    /// Complete a claimed task-pair swap
    SomacFinish(SwapDescriptor),
    /// Notify busy-level listeners
    SysbusyChanged {
        /// Previous level
        old: SysbusyState,
        /// New level
        new: SysbusyState,
    },
    /// Notify schedulable-set listeners
    MaskChanged(CpuMask),
}

/// FIFO of deferred work
#[derive(Debug, Default)]
pub struct DeferredQueue {
    queue: Mutex<VecDeque<DeferredWork>>,
}

impl DeferredQueue {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue work
    pub fn push(&self, work: DeferredWork) {
        self.queue.lock().push_back(work);
    }

    /// Take the oldest item
    pub fn pop(&self) -> Option<DeferredWork> {
        self.queue.lock().pop_front()
    }

    /// Pending items
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Nothing pending
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
