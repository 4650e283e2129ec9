//! # Core-Sparing
//!
//! Restricts the set of CPUs the host may schedule on, to keep lightly
//! loaded domains on fewer CPUs. The published mask combines the governor's
//! decision with named requests:
//!
//! ```text
//!   final = (governor_open ∪ min_requests) ∩ max_requests
//!           empty? ──▶ max_requests ──▶ every CPU
//! ```
//!
//! A published change is announced on the deferred queue, and CPUs that
//! left the set are drained through their stoppers.

pub mod governor;
pub mod request;
pub mod stats;

pub use governor::{DomainGovState, GovAction, Governor};
pub use request::{RequestKind, RequestList};
pub use stats::{DomainFlags, DomainStats};

use crate::balance::migrate::{self, MigrationWork};
use crate::config::HmpConfig;
use crate::context::SchedContext;
use crate::cpu::CpuRecord;
use crate::cpumask::CpuMask;
use crate::domain::DomainSet;
use crate::task::TaskRecord;
use crate::workqueue::DeferredWork;
use crate::HmpResult;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::Mutex;

/// Governor plus requests plus the published mask
#[derive(Debug)]
pub struct CoreSparing {
    governor: Governor,
    requests: Mutex<RequestList>,
    mask: AtomicU64,
}

impl CoreSparing {
    /// Create with every CPU schedulable
    pub fn new(config: &HmpConfig, domains: &DomainSet, now: u64) -> HmpResult<Self> {
        let all = CpuMask::first_n(config.nr_cpus());
        Ok(Self {
            governor: Governor::new(domains, config.ecs.enabled, now)?,
            requests: Mutex::new(RequestList::new()),
            mask: AtomicU64::new(all.bits()),
        })
    }

    /// The governor
    pub fn governor(&self) -> &Governor {
        &self.governor
    }

    /// Published schedulable set
    pub fn schedulable(&self) -> CpuMask {
        CpuMask::from_bits(self.mask.load(Ordering::Acquire))
    }

    /// Rate-limited governor cycle followed by a recompute
    pub fn update(&self, ctx: &SchedContext<'_>, now: u64) -> Option<CpuMask> {
        if !self.governor.claim_cycle(ctx.config.ecs.update_interval_ns, now) {
            return None;
        }
        self.governor.cycle(ctx, now);
        self.recompute(ctx)
    }

    /// Wakeup fast path; recomputes if a CPU was opened
    pub fn wakeup_fast_path(&self, ctx: &SchedContext<'_>, task: &TaskRecord, dst: &CpuRecord) {
        if self.governor.wakeup_fast_path(ctx, task, dst) {
            self.recompute(ctx);
        }
    }

    /// Enable or disable the governor
    pub fn set_enabled(&self, ctx: &SchedContext<'_>, enabled: bool) -> Option<CpuMask> {
        self.governor.set_enabled(ctx.domains, enabled);
        log::info!("[ecs] governor {}", if enabled { "enabled" } else { "disabled" });
        self.recompute(ctx)
    }

    /// Add or re-reference a request
    pub fn register_request(
        &self,
        ctx: &SchedContext<'_>,
        name: &str,
        kind: RequestKind,
        mask: CpuMask,
    ) -> HmpResult<()> {
        self.requests.lock().register(name, kind, mask)?;
        self.recompute(ctx);
        Ok(())
    }

    /// Change a request's mask
    pub fn update_request(
        &self,
        ctx: &SchedContext<'_>,
        name: &str,
        kind: RequestKind,
        mask: CpuMask,
    ) -> HmpResult<()> {
        self.requests.lock().update(name, kind, mask)?;
        self.recompute(ctx);
        Ok(())
    }

    /// Drop a request reference
    pub fn unregister_request(&self, ctx: &SchedContext<'_>, name: &str, kind: RequestKind) -> HmpResult<()> {
        self.requests.lock().unregister(name, kind)?;
        self.recompute(ctx);
        Ok(())
    }

    /// Rebuild the final mask and publish it if it changed
    pub fn recompute(&self, ctx: &SchedContext<'_>) -> Option<CpuMask> {
        // Held for the whole recompute so publishers are serialized
        let requests = self.requests.lock();
        let all = ctx.cpus.all();
        let (min, max) = requests.resolve(all);

        let mut mask = (self.governor.open_mask() | min) & max & all;
        if mask.is_empty() {
            mask = max & all;
        }
        if mask.is_empty() {
            mask = all;
        }

        let old = CpuMask::from_bits(self.mask.swap(mask.bits(), Ordering::AcqRel));
        if old == mask {
            return None;
        }

        for cpu in ctx.cpus.iter() {
            cpu.set_schedulable(mask.contains(cpu.id()));
        }
        ctx.deferred.push(DeferredWork::MaskChanged(mask));
        log::debug!("[ecs] schedulable {} -> {}", old, mask);

        for cpu in ctx.cpus.iter_mask(old - mask) {
            if cpu.nr_running() > 0 {
                migrate::dispatch(cpu, MigrationWork::Drain { src: cpu.id() });
            }
        }
        drop(requests);
        Some(mask)
    }
}
