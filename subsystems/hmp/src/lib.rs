//! # Helix HMP - Heterogeneous Multicore Scheduling Extension
//!
//! This subsystem augments the host's fair-share scheduler on asymmetric
//! (slow/fast core) systems. It never orders ready tasks itself; it observes
//! the host through a narrow set of hooks and steers placement:
//!
//! - **Load Tracker** (`mlt`): windowed per-CPU / per-task active ratio,
//!   runnable-count averages and microarchitecture counters
//! - **Misfit & Balance Engine** (`balance`): misfit classification,
//!   idle-pull and tick-driven active-push migration
//! - **Core-Sparing Governor** (`ecs`): per-domain open/close decisions
//!   producing the schedulable-core mask
//! - **System Busy-State Monitor** (`sysbusy`): global congestion levels and
//!   the one-shot task-pair swap
//!
//! ## Architecture
//!
//! ```text
//!                     host tick / enqueue / dequeue / switch
//!                                     │
//!                                     ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          HmpEngine                               │
//! │                                                                  │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐             │
//! │  │    Load     │──▶│  Busy-State │──▶│ Core-Sparing│             │
//! │  │   Tracker   │   │   Monitor   │   │  Governor   │             │
//! │  └──────┬──────┘   └──────┬──────┘   └──────┬──────┘             │
//! │         │                 │                 │                    │
//! │         ▼                 ▼                 ▼                    │
//! │  ┌──────────────────────────────────────────────────────────┐    │
//! │  │        Misfit & Balance Engine (migration primitive)      │    │
//! │  └──────────────────────────────────────────────────────────┘    │
//! │         │                                   │                    │
//! │         ▼                                   ▼                    │
//! │  [per-CPU stopper queues]           [deferred work queue]        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Principle
//!
//! Every hot-path operation degrades to a silent no-op when its
//! preconditions do not hold. Only setup and administrative calls return
//! [`HmpResult`].

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

pub mod balance;
pub mod config;
pub mod context;
pub mod cpu;
pub mod cpumask;
pub mod domain;
pub mod ecs;
pub mod engine;
pub mod host;
pub mod metrics;
pub mod mlt;
pub mod sysbusy;
pub mod task;
pub mod workqueue;

#[cfg(test)]
mod testing;

pub use config::{DomainSpec, HmpConfig};
pub use cpumask::CpuMask;
pub use engine::{EnqueueFlags, HmpEngine};
pub use host::{HostOps, MaskListener, SysbusyListener};
pub use sysbusy::SysbusyState;

/// Fixed-point scale shared by capacities, utilizations and active ratios
pub const SCHED_CAPACITY_SCALE: u32 = 1024;

/// Maximum number of CPUs supported by the CPU arena
pub const MAX_CPUS: usize = 64;

/// Nanoseconds per millisecond
pub const NSEC_PER_MSEC: u64 = 1_000_000;

/// CPU identifier (index into the CPU arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct CpuId(u32);

impl CpuId {
    /// Create a CPU ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Arena index
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Task identifier, assigned by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TaskId(u64);

impl TaskId {
    /// Create a task ID
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Result type for setup and administrative operations
pub type HmpResult<T> = Result<T, HmpError>;

/// HMP errors
///
/// Only returned from setup and administrative calls. Hot paths never fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmpError {
    /// Topology is empty, overlapping, unordered or leaves a CPU out
    InvalidTopology,
    /// CPU not found
    CpuNotFound,
    /// Task not found
    TaskNotFound,
    /// Already exists
    AlreadyExists,
    /// Named CPU-set request not found
    RequestNotFound,
    /// Invalid argument
    InvalidArgument,
    /// Out of resources
    OutOfResources,
}

impl core::fmt::Display for HmpError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Self::InvalidTopology => "invalid capacity topology",
            Self::CpuNotFound => "cpu not found",
            Self::TaskNotFound => "task not found",
            Self::AlreadyExists => "already exists",
            Self::RequestNotFound => "request not found",
            Self::InvalidArgument => "invalid argument",
            Self::OutOfResources => "out of resources",
        };
        f.write_str(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_id() {
        let cpu = CpuId::new(3);
        assert_eq!(cpu.raw(), 3);
        assert_eq!(cpu.index(), 3);
        assert!(CpuId::new(1) < cpu);
    }

    #[test]
    fn test_task_id() {
        assert_eq!(TaskId::new(42).raw(), 42);
        assert_ne!(TaskId::new(1), TaskId::new(2));
    }
}
