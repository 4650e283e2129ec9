//! # Scheduling Context
//!
//! Borrowed view of every engine service, passed explicitly into the
//! balance, governor and busy-state paths instead of reaching for globals.

use crate::config::HmpConfig;
use crate::cpu::{CpuArena, CpuRecord};
use crate::domain::{Domain, DomainSet};
use crate::host::HostOps;
use crate::metrics::HmpMetrics;
use crate::mlt::LoadTracker;
use crate::sysbusy::{SysbusyMonitor, SysbusyState};
use crate::task::TaskTable;
use crate::workqueue::DeferredQueue;
use crate::CpuId;
use core::fmt;

/// Services shared by all engine paths
#[derive(Clone, Copy)]
pub struct SchedContext<'a> {
    /// Configuration
    pub config: &'a HmpConfig,
    /// CPU arena
    pub cpus: &'a CpuArena,
    /// Domain chain
    pub domains: &'a DomainSet,
    /// Registered tasks
    pub tasks: &'a TaskTable,
    /// Load tracker
    pub tracker: &'a LoadTracker,
    /// Host operations
    pub host: &'a dyn HostOps,
    /// Deferred work
    pub deferred: &'a DeferredQueue,
    /// Event counters
    pub metrics: &'a HmpMetrics,
    /// Busy-state monitor
    pub sysbusy: &'a SysbusyMonitor,
}

impl fmt::Debug for SchedContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedContext")
            .field("cpus", &self.cpus.len())
            .field("domains", &self.domains.len())
            .field("sysbusy", &self.sysbusy.state())
            .finish_non_exhaustive()
    }
}

impl<'a> SchedContext<'a> {
    /// Look up a CPU
    pub fn cpu(&self, id: CpuId) -> Option<&'a CpuRecord> {
        self.cpus.get(id)
    }

    /// Domain of a CPU record
    pub fn domain_of(&self, cpu: &CpuRecord) -> Option<&'a Domain> {
        self.domains.get(cpu.domain())
    }

    /// Current busy level
    pub fn sysbusy_level(&self) -> SysbusyState {
        self.sysbusy.state()
    }
}
