//! # Load Window
//!
//! Ring of completed-period active ratios plus an in-progress accumulator.
//!
//! ```text
//!   periods[]  (ring, MLT_PERIOD_COUNT slots, newest at `cur`)
//!   ┌─────┬─────┬─────┬─────┬─────┬─────┬─────┬─────┐
//!   │ 812 │ 1024│ 990 │  0  │  0  │ 128 │ 640 │ 700 │
//!   └─────┴─────┴─────┴─────┴─────┴─────┴─────┴─────┘
//!                                             ▲ cur
//!   ──────┬──────────────┬──────────────┬───────────────▶ time
//!         period_start   last_updated   period_start + period
//!         ╰─ recent_sum ─╯
//! ```
//!
//! `recent_sum` only ever holds active time of the period that has not been
//! folded into the ring yet, so it never exceeds one period.

use super::uarch::{UarchSnapshot, UarchWindow};
use super::MLT_PERIOD_COUNT;
use crate::SCHED_CAPACITY_SCALE;

/// Query mode for [`LoadWindow::query`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Average of the last `len` completed periods
    Average,
    /// The single completed period `len - 1` periods ago
    Point,
}

/// Windowed active-ratio history of one CPU or task
#[derive(Debug, Clone)]
pub struct LoadWindow {
    /// Period size (nanoseconds)
    period_ns: u64,
    /// Completed periods, 0..=1024
    periods: [u32; MLT_PERIOD_COUNT],
    /// Slot of the most recently completed period
    cur: usize,
    /// Start of the in-progress period
    period_start: u64,
    /// Last time the window was brought up to date
    last_updated: u64,
    /// Active nanoseconds in the in-progress period
    recent_sum: u64,
    /// Active since `last_updated`
    active: bool,
    /// Optional microarchitecture sub-windows
    uarch: Option<UarchWindow>,
}

impl LoadWindow {
    /// Create an idle window aligned to the period grid
    pub fn new(period_ns: u64, now: u64) -> Self {
        let period_ns = period_ns.max(1);
        Self {
            period_ns,
            periods: [0; MLT_PERIOD_COUNT],
            cur: 0,
            period_start: now - now % period_ns,
            last_updated: now,
            recent_sum: 0,
            active: false,
            uarch: None,
        }
    }

    /// Attach microarchitecture sub-windows on the same grid
    pub fn with_uarch(mut self) -> Self {
        self.uarch = Some(UarchWindow::new(self.period_ns, self.last_updated));
        self
    }

    /// Period size (nanoseconds)
    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    /// Is the tracked object active?
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Last update timestamp
    pub fn last_updated(&self) -> u64 {
        self.last_updated
    }

    /// Active nanoseconds folded into the in-progress period
    pub fn recent_sum(&self) -> u64 {
        self.recent_sum
    }

    /// Bring the window up to `now`
    ///
    /// A `now` earlier than the last update (clock skew between CPUs) counts
    /// as zero elapsed time.
    pub fn update(&mut self, now: u64) {
        if now <= self.last_updated {
            return;
        }

        let period_end = self.period_start + self.period_ns;
        if now < period_end {
            if self.active {
                self.recent_sum += now - self.last_updated;
            }
            self.last_updated = now;
            return;
        }

        if self.active {
            self.recent_sum += period_end - self.last_updated;
        }
        let ratio = self.ratio(self.recent_sum);
        self.push(ratio);

        // Whole periods skipped since the boundary all carry the same value.
        // Filling at most one ring's worth keeps this bounded for any gap.
        let skipped = (now - period_end) / self.period_ns;
        if skipped > 0 {
            let fill = if self.active { SCHED_CAPACITY_SCALE } else { 0 };
            for _ in 0..skipped.min(MLT_PERIOD_COUNT as u64) {
                self.push(fill);
            }
        }

        self.period_start = period_end + skipped * self.period_ns;
        self.recent_sum = if self.active { now - self.period_start } else { 0 };
        self.last_updated = now;
    }

    /// Update to `now`, then switch state
    pub fn set_active(&mut self, active: bool, now: u64) {
        self.update(now);
        self.active = active;
    }

    /// In-progress ratio (0..=1024)
    pub fn recent(&self) -> u32 {
        self.ratio(self.recent_sum)
    }

    /// Most recently completed period
    pub fn last(&self) -> u32 {
        self.periods[self.cur]
    }

    /// Query the last `len` periods (clamped to `1..=MLT_PERIOD_COUNT`)
    ///
    /// In average mode, an oldest slot smaller than the in-progress ratio is
    /// replaced by it so a task that just turned busy is not undercounted.
    pub fn query(&self, len: usize, mode: QueryMode) -> u32 {
        let len = len.clamp(1, MLT_PERIOD_COUNT);
        match mode {
            QueryMode::Point => self.slot(len - 1),
            QueryMode::Average => {
                let mut sum: u32 = (0..len).map(|ago| self.slot(ago)).sum();
                let oldest = self.slot(len - 1);
                let recent = self.recent();
                if oldest < recent {
                    sum = sum - oldest + recent;
                }
                sum / len as u32
            }
        }
    }

    /// Record a hardware counter snapshot, if sub-windows are attached
    pub fn record_uarch(&mut self, now: u64, snapshot: UarchSnapshot) {
        if let Some(uarch) = self.uarch.as_mut() {
            uarch.record(now, snapshot);
        }
    }

    /// Microarchitecture sub-windows
    pub fn uarch(&self) -> Option<&UarchWindow> {
        self.uarch.as_ref()
    }

    fn slot(&self, ago: usize) -> u32 {
        self.periods[(self.cur + MLT_PERIOD_COUNT - ago % MLT_PERIOD_COUNT) % MLT_PERIOD_COUNT]
    }

    fn push(&mut self, value: u32) {
        self.cur = (self.cur + 1) % MLT_PERIOD_COUNT;
        self.periods[self.cur] = value;
    }

    fn ratio(&self, active_ns: u64) -> u32 {
        let ratio = active_ns * SCHED_CAPACITY_SCALE as u64 / self.period_ns;
        ratio.min(SCHED_CAPACITY_SCALE as u64) as u32
    }
}
