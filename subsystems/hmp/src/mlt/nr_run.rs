//! # Runnable-Count Tracker
//!
//! Time-weighted average of a CPU's runnable task count per period, in units
//! of [`NR_RUN_UNIT`] (100 = one task for the whole period).

/// One runnable task for a full period
pub const NR_RUN_UNIT: u32 = 100;

/// Per-CPU average runnable count
#[derive(Debug, Clone)]
pub struct NrRunTracker {
    period_ns: u64,
    period_start: u64,
    last_updated: u64,
    /// Current runnable count
    nr_running: u32,
    /// Task-nanoseconds accumulated in the in-progress period
    accum: u64,
    /// Average of the last completed period
    avg: u32,
}

impl NrRunTracker {
    /// Create a tracker aligned to the period grid
    pub fn new(period_ns: u64, now: u64) -> Self {
        let period_ns = period_ns.max(1);
        Self {
            period_ns,
            period_start: now - now % period_ns,
            last_updated: now,
            nr_running: 0,
            accum: 0,
            avg: 0,
        }
    }

    /// Bring the tracker up to `now`
    pub fn update(&mut self, now: u64) {
        if now <= self.last_updated {
            return;
        }

        let nr = self.nr_running as u64;
        let period_end = self.period_start + self.period_ns;
        if now < period_end {
            self.accum += nr * (now - self.last_updated);
            self.last_updated = now;
            return;
        }

        self.accum += nr * (period_end - self.last_updated);
        self.avg = (self.accum * NR_RUN_UNIT as u64 / self.period_ns) as u32;

        let skipped = (now - period_end) / self.period_ns;
        if skipped > 0 {
            self.avg = self.nr_running * NR_RUN_UNIT;
        }

        self.period_start = period_end + skipped * self.period_ns;
        self.accum = nr * (now - self.period_start);
        self.last_updated = now;
    }

    /// Update to `now`, then record a new runnable count
    pub fn set_nr_running(&mut self, nr_running: u32, now: u64) {
        self.update(now);
        self.nr_running = nr_running;
    }

    /// Average of the last completed period
    pub fn avg(&self) -> u32 {
        self.avg
    }

    /// Instantaneous runnable count
    pub fn nr_running(&self) -> u32 {
        self.nr_running
    }
}
