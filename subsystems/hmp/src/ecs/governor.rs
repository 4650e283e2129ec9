//! # Core-Sparing Governor
//!
//! Decides per domain which CPUs stay open. Domains are visited slowest
//! first so that misfit pressure a slow domain cannot resolve cascades to
//! the next faster one.
//!
//! ```text
//!   overloaded?  ──yes──▶ reset counter, open max(1, excess + pressure)
//!       │
//!       no
//!       ▼
//!   counter += 1 (2 if UNDER_AR)
//!   counter >= threshold ──▶ close highest open CPU (above min_open), reset
//! ```

use super::stats::{DomainFlags, DomainStats};
use crate::context::SchedContext;
use crate::cpu::CpuRecord;
use crate::cpumask::CpuMask;
use crate::domain::{Domain, DomainSet};
use crate::task::TaskRecord;
use crate::{HmpError, HmpResult};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use spin::Mutex;

/// Governor state of one domain
#[derive(Debug, Clone, Default)]
pub struct DomainGovState {
    /// Governor-open CPUs
    pub open: CpuMask,
    /// Consecutive non-overloaded credit toward closing a CPU
    pub close_count: u32,
    /// Flags of the last cycle
    pub flags: DomainFlags,
    /// Stats of the last cycle
    pub stats: DomainStats,
}

/// What a cycle does to one domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovAction {
    /// Open this many closed CPUs
    Open(usize),
    /// Close one open CPU
    Close,
    /// Leave the domain as is
    Hold,
}

/// Decide a domain's action from its flags and stats
///
/// Updates the hysteresis counter in `state`.
pub fn decide(state: &mut DomainGovState, domain: &Domain, close_threshold: u32, incoming: u32) -> GovAction {
    let nr_closed = (domain.cpus() - state.open).count();

    if state.flags.is_overloaded() {
        state.close_count = 0;
        let unresolved = incoming.saturating_sub(state.stats.idle_open());
        let want = (state.stats.excess_runnable() + unresolved).max(1) as usize;
        return match want.min(nr_closed) {
            0 => GovAction::Hold,
            n => GovAction::Open(n),
        };
    }

    let step = if state.flags.contains(DomainFlags::UNDER_AR) { 2 } else { 1 };
    state.close_count += step;
    if state.close_count < close_threshold {
        return GovAction::Hold;
    }
    state.close_count = 0;
    if (domain.cpus() & state.open).count() > domain.min_open() {
        GovAction::Close
    } else {
        GovAction::Hold
    }
}

/// Per-domain open/close governor
#[derive(Debug)]
pub struct Governor {
    enabled: AtomicBool,
    states: Vec<Mutex<DomainGovState>>,
    last_update: AtomicU64,
}

impl Governor {
    /// Create with every CPU open
    pub fn new(domains: &DomainSet, enabled: bool, now: u64) -> HmpResult<Self> {
        let mut states = Vec::new();
        states
            .try_reserve_exact(domains.len())
            .map_err(|_| HmpError::OutOfResources)?;
        for domain in domains.iter() {
            states.push(Mutex::new(DomainGovState {
                open: domain.cpus(),
                ..DomainGovState::default()
            }));
        }
        Ok(Self {
            enabled: AtomicBool::new(enabled),
            states,
            last_update: AtomicU64::new(now),
        })
    }

    /// Is the governor restricting CPUs?
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Enable or disable; disabling opens every CPU
    pub fn set_enabled(&self, domains: &DomainSet, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        if !enabled {
            for (state, domain) in self.states.iter().zip(domains.iter()) {
                let mut state = state.lock();
                state.open = domain.cpus();
                state.close_count = 0;
            }
        }
    }

    /// Union of all domains' open CPUs
    pub fn open_mask(&self) -> CpuMask {
        self.states
            .iter()
            .fold(CpuMask::empty(), |acc, s| acc | s.lock().open)
    }

    /// Copy of a domain's state
    pub fn domain_state(&self, index: usize) -> Option<DomainGovState> {
        self.states.get(index).map(|s| s.lock().clone())
    }

    #[cfg(test)]
    pub(crate) fn with_state(&self, index: usize, f: impl FnOnce(&mut DomainGovState)) {
        f(&mut self.states[index].lock());
    }

    /// Claim the next cycle; exactly one caller wins per interval
    pub fn claim_cycle(&self, interval_ns: u64, now: u64) -> bool {
        let last = self.last_update.load(Ordering::Acquire);
        if now.saturating_sub(last) < interval_ns {
            return false;
        }
        self.last_update
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Run one cycle over all domains; returns true if any CPU changed
    pub fn cycle(&self, ctx: &SchedContext<'_>, now: u64) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let ecs = &ctx.config.ecs;
        let mut incoming = 0;
        let mut changed = false;
        for (domain, state) in ctx.domains.iter().zip(self.states.iter()) {
            let mut state = state.lock();
            state.stats = DomainStats::collect(ctx, domain, state.open, now);
            state.flags = state
                .stats
                .classify(domain.busy_ratio(), ecs.over_util_pct, incoming);

            let action = decide(&mut state, domain, ecs.close_threshold, incoming);
            let opened = match action {
                GovAction::Open(n) => {
                    let closed = domain.cpus() - state.open;
                    let picked: CpuMask = closed.iter().take(n).collect();
                    state.open |= picked;
                    ctx.metrics.record_opened(picked.count() as u64);
                    log::debug!(
                        "[ecs] domain {} open {} ({:?})",
                        domain.index(),
                        picked,
                        state.flags
                    );
                    changed = true;
                    picked.count() as u32
                }
                GovAction::Close => {
                    if let Some(cpu) = close_candidate(ctx, domain, state.open) {
                        state.open.clear(cpu.id());
                        ctx.metrics.record_closed(1);
                        log::debug!("[ecs] domain {} close cpu {}", domain.index(), cpu.id().raw());
                        changed = true;
                    }
                    0
                }
                GovAction::Hold => 0,
            };

            let absorbed = state.stats.idle_open() + opened;
            incoming = state.stats.misfit_sum + incoming.saturating_sub(absorbed);
        }
        changed
    }

    /// A waking task does not fit the destination domain's open CPUs
    ///
    /// Opens exactly one closed CPU of `dst`'s domain when the least-loaded
    /// open CPU cannot take `task` within its current capacity. Returns true
    /// if a CPU was opened.
    pub fn wakeup_fast_path(&self, ctx: &SchedContext<'_>, task: &TaskRecord, dst: &CpuRecord) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let Some(domain) = ctx.domain_of(dst) else {
            return false;
        };
        let Some(state) = self.states.get(domain.index()) else {
            return false;
        };

        let mut state = state.lock();
        let Some(closed) = (domain.cpus() - state.open).first() else {
            return false;
        };
        let fits = ctx
            .cpus
            .iter_mask(domain.cpus() & state.open)
            .min_by_key(|c| (c.util(), c.id()))
            .is_some_and(|c| c.util() + task.util() <= c.capacity_cur());
        if fits {
            return false;
        }

        state.open.set(closed);
        state.close_count = 0;
        ctx.metrics.record_opened(1);
        log::debug!(
            "[ecs] wakeup of task {} opens cpu {}",
            task.id().raw(),
            closed.raw()
        );
        true
    }
}

/// Highest-capacity open CPU of the domain; ties go to the highest id
fn close_candidate<'a>(ctx: &SchedContext<'a>, domain: &Domain, open: CpuMask) -> Option<&'a CpuRecord> {
    ctx.cpus
        .iter_mask(domain.cpus() & open)
        .max_by_key(|c| (c.capacity_orig(), c.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HmpConfig;
    use crate::testing::Fixture;
    use crate::CpuId;

    fn little() -> Domain {
        let config = HmpConfig::big_little(4, 4);
        DomainSet::new(&config.topology).get(0).cloned().unwrap()
    }

    #[test]
    fn test_open_on_first_overloaded_cycle() {
        let domain = little();
        let mut state = DomainGovState {
            open: CpuMask::from_cpus(&[0]),
            flags: DomainFlags::OVER_RUN,
            stats: DomainStats { nr_open: 1, busy_cpus: 1, avg_nr_run: 300, ..Default::default() },
            close_count: 4,
        };

        assert_eq!(decide(&mut state, &domain, 6, 0), GovAction::Open(2));
        assert_eq!(state.close_count, 0);
    }

    #[test]
    fn test_open_capped_at_closed() {
        let domain = little();
        let mut state = DomainGovState {
            open: CpuMask::from_cpus(&[0, 1, 2]),
            flags: DomainFlags::OVER_UTIL,
            stats: DomainStats { nr_open: 3, busy_cpus: 3, avg_nr_run: 900, ..Default::default() },
            close_count: 0,
        };
        assert_eq!(decide(&mut state, &domain, 6, 0), GovAction::Open(1));

        state.open = domain.cpus();
        assert_eq!(decide(&mut state, &domain, 6, 0), GovAction::Hold);
    }

    #[test]
    fn test_close_after_threshold() {
        let domain = little();
        let mut state = DomainGovState {
            open: domain.cpus(),
            flags: DomainFlags::HAS_IDLE,
            stats: DomainStats::default(),
            close_count: 0,
        };

        for _ in 0..5 {
            assert_eq!(decide(&mut state, &domain, 6, 0), GovAction::Hold);
        }
        assert_eq!(decide(&mut state, &domain, 6, 0), GovAction::Close);
        assert_eq!(state.close_count, 0);
    }

    #[test]
    fn test_under_ar_doubles_rate() {
        let domain = little();
        let mut state = DomainGovState {
            open: domain.cpus(),
            flags: DomainFlags::HAS_IDLE | DomainFlags::UNDER_AR,
            ..Default::default()
        };
        assert_eq!(decide(&mut state, &domain, 6, 0), GovAction::Hold);
        assert_eq!(decide(&mut state, &domain, 6, 0), GovAction::Hold);
        assert_eq!(decide(&mut state, &domain, 6, 0), GovAction::Close);
    }

    #[test]
    fn test_min_open_respected() {
        let domain = little();
        let mut state = DomainGovState {
            open: CpuMask::from_cpus(&[0]),
            flags: DomainFlags::HAS_IDLE,
            ..Default::default()
        };
        for _ in 0..20 {
            assert_eq!(decide(&mut state, &domain, 6, 0), GovAction::Hold);
        }
    }

    #[test]
    fn test_help_prev_cascades() {
        let f = Fixture::new(HmpConfig::tri_cluster());
        // Three misfit tasks running on little CPUs
        f.run(1, 600, 0, 0);
        f.run(2, 600, 1, 0);
        f.run(3, 600, 2, 0);

        let ctx = f.engine.ctx();
        let governor = f.engine.governor().unwrap();
        // Close the mid domain down to one CPU
        for cpu in [5, 6] {
            let mut state = governor.states[1].lock();
            state.open.clear(CpuId::new(cpu));
        }

        governor.cycle(&ctx, 1);
        let mid = governor.domain_state(1).unwrap();
        assert!(mid.flags.contains(DomainFlags::HELP_PREV));
        assert_eq!(mid.open, CpuMask::from_cpus(&[4, 5, 6]));
    }

    #[test]
    fn test_wakeup_fast_path_opens_one() {
        let f = Fixture::new(HmpConfig::big_little(2, 2));
        let ctx = f.engine.ctx();
        let governor = f.engine.governor().unwrap();
        governor.states[1].lock().open = CpuMask::from_cpus(&[2]);
        f.run(1, 900, 2, 0);

        let task = f.add_task(2, 500);
        let dst = f.engine.cpu(CpuId::new(2)).unwrap();
        assert!(governor.wakeup_fast_path(&ctx, &task, dst));
        assert_eq!(governor.domain_state(1).unwrap().open, CpuMask::from_cpus(&[2, 3]));
        // Nothing left to open
        assert!(!governor.wakeup_fast_path(&ctx, &task, dst));
    }

    #[test]
    fn test_disable_opens_everything() {
        let f = Fixture::new(HmpConfig::big_little(2, 2));
        let governor = f.engine.governor().unwrap();
        governor.states[1].lock().open = CpuMask::empty();
        governor.set_enabled(f.engine.domains(), false);
        assert_eq!(governor.open_mask(), CpuMask::first_n(4));
        assert!(!governor.cycle(&f.engine.ctx(), 100));
    }
}
