//! # Load Tracker
//!
//! Decaying activity history per CPU and per task. Every tracked object owns
//! its own window behind its own lock, so updates never contend across
//! objects and can run with interrupts disabled.
//!
//! ## Tracked signals
//!
//! | Signal | Owner | Fed by |
//! |--------|-------|--------|
//! | Active ratio | CPU, task | context switch, tick |
//! | Runnable count | CPU | enqueue, dequeue |
//! | IPC / MSPC | CPU | hardware counter reads on tick |

pub mod nr_run;
pub mod uarch;
pub mod window;

pub use nr_run::{NrRunTracker, NR_RUN_UNIT};
pub use uarch::{UarchSnapshot, UarchWindow};
pub use window::{LoadWindow, QueryMode};

use crate::config::MltConfig;
use crate::cpu::CpuRecord;
use crate::task::TaskRecord;
use static_assertions::const_assert;

/// Number of completed periods kept per window
pub const MLT_PERIOD_COUNT: usize = 8;

const_assert!(MLT_PERIOD_COUNT >= 2);

/// Load Tracker service
#[derive(Debug, Clone)]
pub struct LoadTracker {
    config: MltConfig,
}

impl LoadTracker {
    /// Create the tracker
    pub fn new(config: MltConfig) -> Self {
        Self { config }
    }

    /// Tracker configuration
    pub fn config(&self) -> &MltConfig {
        &self.config
    }

    /// Fresh window for a CPU, with counter sub-windows if enabled
    pub fn new_cpu_window(&self, now: u64) -> LoadWindow {
        let window = LoadWindow::new(self.config.period_ns, now);
        if self.config.uarch {
            window.with_uarch()
        } else {
            window
        }
    }

    /// Fresh window for a task; counters are only read per CPU
    pub fn new_task_window(&self, now: u64) -> LoadWindow {
        LoadWindow::new(self.config.period_ns, now)
    }

    /// Fresh runnable-count tracker for a new CPU
    pub fn new_nr_run(&self, now: u64) -> NrRunTracker {
        NrRunTracker::new(self.config.period_ns, now)
    }

    /// Bring a CPU's windows up to `now`
    pub fn update_cpu(&self, cpu: &CpuRecord, now: u64) {
        cpu.load.lock().update(now);
        cpu.nr_run.lock().update(now);
    }

    /// CPU went busy (`active`) or idle
    pub fn cpu_state_change(&self, cpu: &CpuRecord, active: bool, now: u64) {
        cpu.load.lock().set_active(active, now);
    }

    /// CPU runnable count changed
    pub fn cpu_nr_running(&self, cpu: &CpuRecord, nr_running: u32, now: u64) {
        cpu.nr_run.lock().set_nr_running(nr_running, now);
    }

    /// Bring a task's window up to `now`
    pub fn update_task(&self, task: &TaskRecord, now: u64) {
        task.load.lock().update(now);
    }

    /// Task started (`active`) or stopped running
    pub fn task_state_change(&self, task: &TaskRecord, active: bool, now: u64) {
        task.load.lock().set_active(active, now);
    }

    /// Fold a hardware counter read into a CPU's sub-windows
    pub fn record_uarch(&self, cpu: &CpuRecord, now: u64, snapshot: UarchSnapshot) {
        if self.config.uarch {
            cpu.load.lock().record_uarch(now, snapshot);
        }
    }

    /// Windowed active ratio of a CPU (0..=1024)
    pub fn cpu_active_ratio(&self, cpu: &CpuRecord, now: u64) -> u32 {
        let mut load = cpu.load.lock();
        load.update(now);
        load.query(self.config.window_len, QueryMode::Average)
    }

    /// Windowed active ratio of a task (0..=1024)
    pub fn task_active_ratio(&self, task: &TaskRecord, now: u64) -> u32 {
        let mut load = task.load.lock();
        load.update(now);
        load.query(self.config.window_len, QueryMode::Average)
    }

    /// Average runnable count of a CPU over the last completed period
    pub fn cpu_avg_nr_run(&self, cpu: &CpuRecord, now: u64) -> u32 {
        let mut nr_run = cpu.nr_run.lock();
        nr_run.update(now);
        nr_run.avg()
    }

    /// Average IPC of a CPU, if counters are tracked
    pub fn cpu_ipc(&self, cpu: &CpuRecord) -> Option<u32> {
        cpu.load
            .lock()
            .uarch()
            .map(|u| u.avg_ipc(self.config.window_len))
    }

    /// Average memory stalls per cycle of a CPU, if counters are tracked
    pub fn cpu_mspc(&self, cpu: &CpuRecord) -> Option<u32> {
        cpu.load
            .lock()
            .uarch()
            .map(|u| u.avg_mspc(self.config.window_len))
    }
}
