//! # HMP Metrics
//!
//! Event counters for the balance engine, the governor and the busy-state
//! monitor. All counters are relaxed; readers see a best-effort snapshot.

use core::sync::atomic::{AtomicU64, Ordering};

/// Engine metrics
#[derive(Debug)]
pub struct HmpMetrics {
    /// Completed migrations (any path)
    migrations: AtomicU64,
    /// Idle-pull migrations and dispatches
    idle_pulls: AtomicU64,
    /// Active-push dispatches
    active_pushes: AtomicU64,
    /// Migrations dropped because preconditions no longer held
    aborted_migrations: AtomicU64,
    /// Completed task-pair swaps
    somac_swaps: AtomicU64,
    /// Cheap rebalances done instead of a swap
    cheap_rebalances: AtomicU64,
    /// CPUs opened by the governor
    cores_opened: AtomicU64,
    /// CPUs closed by the governor
    cores_closed: AtomicU64,
    /// Busy-level transitions
    sysbusy_transitions: AtomicU64,
}

/// Point-in-time copy of [`HmpMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Completed migrations
    pub migrations: u64,
    /// Idle pulls
    pub idle_pulls: u64,
    /// Active pushes
    pub active_pushes: u64,
    /// Aborted migrations
    pub aborted_migrations: u64,
    /// Task-pair swaps
    pub somac_swaps: u64,
    /// Cheap rebalances
    pub cheap_rebalances: u64,
    /// CPUs opened
    pub cores_opened: u64,
    /// CPUs closed
    pub cores_closed: u64,
    /// Busy-level transitions
    pub sysbusy_transitions: u64,
}

impl HmpMetrics {
    /// Create new metrics
    pub const fn new() -> Self {
        Self {
            migrations: AtomicU64::new(0),
            idle_pulls: AtomicU64::new(0),
            active_pushes: AtomicU64::new(0),
            aborted_migrations: AtomicU64::new(0),
            somac_swaps: AtomicU64::new(0),
            cheap_rebalances: AtomicU64::new(0),
            cores_opened: AtomicU64::new(0),
            cores_closed: AtomicU64::new(0),
            sysbusy_transitions: AtomicU64::new(0),
        }
    }

    /// Record a migration
    pub fn record_migration(&self) {
        self.migrations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an idle pull
    pub fn record_idle_pull(&self) {
        self.idle_pulls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an active push
    pub fn record_active_push(&self) {
        self.active_pushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dropped migration
    pub fn record_aborted(&self) {
        self.aborted_migrations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a task-pair swap
    pub fn record_swap(&self) {
        self.somac_swaps.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cheap rebalance
    pub fn record_cheap_rebalance(&self) {
        self.cheap_rebalances.fetch_add(1, Ordering::Relaxed);
    }

    /// Record opened CPUs
    pub fn record_opened(&self, n: u64) {
        self.cores_opened.fetch_add(n, Ordering::Relaxed);
    }

    /// Record closed CPUs
    pub fn record_closed(&self, n: u64) {
        self.cores_closed.fetch_add(n, Ordering::Relaxed);
    }

    /// Record a busy-level transition
    pub fn record_sysbusy_transition(&self) {
        self.sysbusy_transitions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get completed migrations
    pub fn migrations(&self) -> u64 {
        self.migrations.load(Ordering::Relaxed)
    }

    /// Copy all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            migrations: self.migrations.load(Ordering::Relaxed),
            idle_pulls: self.idle_pulls.load(Ordering::Relaxed),
            active_pushes: self.active_pushes.load(Ordering::Relaxed),
            aborted_migrations: self.aborted_migrations.load(Ordering::Relaxed),
            somac_swaps: self.somac_swaps.load(Ordering::Relaxed),
            cheap_rebalances: self.cheap_rebalances.load(Ordering::Relaxed),
            cores_opened: self.cores_opened.load(Ordering::Relaxed),
            cores_closed: self.cores_closed.load(Ordering::Relaxed),
            sysbusy_transitions: self.sysbusy_transitions.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.migrations.store(0, Ordering::Relaxed);
        self.idle_pulls.store(0, Ordering::Relaxed);
        self.active_pushes.store(0, Ordering::Relaxed);
        self.aborted_migrations.store(0, Ordering::Relaxed);
        self.somac_swaps.store(0, Ordering::Relaxed);
        self.cheap_rebalances.store(0, Ordering::Relaxed);
        self.cores_opened.store(0, Ordering::Relaxed);
        self.cores_closed.store(0, Ordering::Relaxed);
        self.sysbusy_transitions.store(0, Ordering::Relaxed);
    }
}

impl Default for HmpMetrics {
    fn default() -> Self {
        Self::new()
    }
}
