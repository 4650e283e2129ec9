//! # Microarchitecture Sub-Windows
//!
//! IPC and memory-stall-per-cycle history on the same period grid as the
//! owning [`LoadWindow`](super::LoadWindow). Counter reads may arrive less
//! often than once per period; an interval that spans several periods is
//! credited to all of them.

use super::MLT_PERIOD_COUNT;
use crate::SCHED_CAPACITY_SCALE;

/// Raw cumulative hardware counter values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UarchSnapshot {
    /// Core cycles
    pub cycles: u64,
    /// Instructions retired
    pub inst_ret: u64,
    /// Cycles stalled on memory
    pub mem_stall: u64,
}

/// IPC / MSPC ring buffers (both scaled by 1024)
#[derive(Debug, Clone)]
pub struct UarchWindow {
    period_ns: u64,
    ipc: [u32; MLT_PERIOD_COUNT],
    mspc: [u32; MLT_PERIOD_COUNT],
    cur: usize,
    period_start: u64,
    last_updated: u64,
    last: Option<UarchSnapshot>,
    acc_cycles: u64,
    acc_inst: u64,
    acc_stall: u64,
}

impl UarchWindow {
    /// Create an empty window aligned to the period grid
    pub fn new(period_ns: u64, now: u64) -> Self {
        let period_ns = period_ns.max(1);
        Self {
            period_ns,
            ipc: [0; MLT_PERIOD_COUNT],
            mspc: [0; MLT_PERIOD_COUNT],
            cur: 0,
            period_start: now - now % period_ns,
            last_updated: now,
            last: None,
            acc_cycles: 0,
            acc_inst: 0,
            acc_stall: 0,
        }
    }

    /// Fold a counter snapshot taken at `now`
    ///
    /// The first snapshot only establishes the baseline. Counter wrap is
    /// handled with wrapping deltas.
    pub fn record(&mut self, now: u64, snapshot: UarchSnapshot) {
        if let Some(last) = self.last {
            self.acc_cycles += snapshot.cycles.wrapping_sub(last.cycles);
            self.acc_inst += snapshot.inst_ret.wrapping_sub(last.inst_ret);
            self.acc_stall += snapshot.mem_stall.wrapping_sub(last.mem_stall);
        }
        self.last = Some(snapshot);

        if now <= self.last_updated {
            return;
        }
        self.last_updated = now;

        let period_end = self.period_start + self.period_ns;
        if now < period_end {
            return;
        }

        let ipc = ratio(self.acc_inst, self.acc_cycles);
        let mspc = ratio(self.acc_stall, self.acc_cycles);
        let skipped = (now - period_end) / self.period_ns;
        for _ in 0..=skipped.min(MLT_PERIOD_COUNT as u64) {
            self.push(ipc, mspc);
        }

        self.period_start = period_end + skipped * self.period_ns;
        self.acc_cycles = 0;
        self.acc_inst = 0;
        self.acc_stall = 0;
    }

    /// IPC of the period `ago` periods back (0 = last completed)
    pub fn ipc(&self, ago: usize) -> u32 {
        self.ipc[self.index(ago)]
    }

    /// Memory stalls per cycle of the period `ago` periods back
    pub fn mspc(&self, ago: usize) -> u32 {
        self.mspc[self.index(ago)]
    }

    /// Average IPC over the last `len` periods
    pub fn avg_ipc(&self, len: usize) -> u32 {
        let len = len.clamp(1, MLT_PERIOD_COUNT);
        (0..len).map(|ago| self.ipc(ago) as u64).sum::<u64>() as u32 / len as u32
    }

    /// Average MSPC over the last `len` periods
    pub fn avg_mspc(&self, len: usize) -> u32 {
        let len = len.clamp(1, MLT_PERIOD_COUNT);
        (0..len).map(|ago| self.mspc(ago) as u64).sum::<u64>() as u32 / len as u32
    }

    fn index(&self, ago: usize) -> usize {
        (self.cur + MLT_PERIOD_COUNT - ago % MLT_PERIOD_COUNT) % MLT_PERIOD_COUNT
    }

    fn push(&mut self, ipc: u32, mspc: u32) {
        self.cur = (self.cur + 1) % MLT_PERIOD_COUNT;
        self.ipc[self.cur] = ipc;
        self.mspc[self.cur] = mspc;
    }
}

fn ratio(num: u64, den: u64) -> u32 {
    if den == 0 {
        return 0;
    }
    (num.saturating_mul(SCHED_CAPACITY_SCALE as u64) / den).min(u32::MAX as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: u64 = 4_000_000;

    fn snap(cycles: u64, inst_ret: u64, mem_stall: u64) -> UarchSnapshot {
        UarchSnapshot { cycles, inst_ret, mem_stall }
    }

    #[test]
    fn test_first_snapshot_is_baseline() {
        let mut w = UarchWindow::new(PERIOD, 0);
        w.record(PERIOD + 1, snap(1_000, 2_000, 100));
        assert_eq!(w.ipc(0), 0);
    }

    #[test]
    fn test_ipc_and_mspc() {
        let mut w = UarchWindow::new(PERIOD, 0);
        w.record(0, snap(0, 0, 0));
        w.record(PERIOD / 2, snap(1_000, 1_500, 100));
        w.record(PERIOD, snap(2_000, 3_000, 500));

        assert_eq!(w.ipc(0), 1536);
        assert_eq!(w.mspc(0), 256);
    }

    #[test]
    fn test_skipped_periods_share_ratio() {
        let mut w = UarchWindow::new(PERIOD, 0);
        w.record(0, snap(0, 0, 0));
        w.record(3 * PERIOD, snap(3_000, 3_000, 0));

        for ago in 0..3 {
            assert_eq!(w.ipc(ago), 1024);
        }
        assert_eq!(w.avg_ipc(3), 1024);
    }

    #[test]
    fn test_counter_wrap() {
        let mut w = UarchWindow::new(PERIOD, 0);
        w.record(0, snap(u64::MAX - 99, u64::MAX - 49, 0));
        w.record(PERIOD, snap(100, 50, 0));
        assert_eq!(w.ipc(0), 512);
    }
}
