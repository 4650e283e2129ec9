//! Test host and engine fixture

use crate::config::HmpConfig;
use crate::engine::{EnqueueFlags, HmpEngine};
use crate::host::HostOps;
use crate::task::{TaskInfo, TaskRecord};
use crate::{CpuId, TaskId};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

/// Host that records every physical move it is asked for
#[derive(Debug, Default)]
pub(crate) struct RecordingHost {
    moves: Mutex<Vec<(TaskId, CpuId, CpuId)>>,
    swaps: Mutex<Vec<(TaskId, CpuId, TaskId, CpuId)>>,
    /// Refuse every move and swap
    pub refuse: AtomicBool,
}

impl RecordingHost {
    pub fn moves(&self) -> Vec<(TaskId, CpuId, CpuId)> {
        self.moves.lock().clone()
    }

    pub fn swaps(&self) -> Vec<(TaskId, CpuId, TaskId, CpuId)> {
        self.swaps.lock().clone()
    }
}

impl HostOps for RecordingHost {
    fn move_task(&self, task: &TaskRecord, src: CpuId, dst: CpuId) -> bool {
        if self.refuse.load(Ordering::SeqCst) {
            return false;
        }
        self.moves.lock().push((task.id(), src, dst));
        true
    }

    fn swap_running(&self, a: &TaskRecord, a_cpu: CpuId, b: &TaskRecord, b_cpu: CpuId) -> bool {
        if self.refuse.load(Ordering::SeqCst) {
            return false;
        }
        self.swaps.lock().push((a.id(), a_cpu, b.id(), b_cpu));
        true
    }
}

/// Engine wired to a [`RecordingHost`], built at time 0
pub(crate) struct Fixture {
    pub engine: HmpEngine,
    pub host: Arc<RecordingHost>,
}

impl Fixture {
    pub fn new(config: HmpConfig) -> Self {
        let host = Arc::new(RecordingHost::default());
        let engine = HmpEngine::new(config, host.clone(), 0).unwrap();
        Self { engine, host }
    }

    /// Register a task without placing it
    pub fn add_task(&self, id: u64, util: u32) -> Arc<TaskRecord> {
        self.engine
            .register_task(TaskInfo::new(TaskId::new(id), util), 0)
            .unwrap()
    }

    /// Register a task, wake it on `cpu` and switch to it
    pub fn run(&self, id: u64, util: u32, cpu: u32, now: u64) -> Arc<TaskRecord> {
        let task = self
            .engine
            .register_task(TaskInfo::new(TaskId::new(id), util), now)
            .unwrap();
        let cpu = CpuId::new(cpu);
        let prev = self
            .engine
            .cpu(cpu)
            .and_then(|c| c.current())
            .map(|t| t.id());
        self.engine.enqueue(cpu, task.id(), EnqueueFlags::WAKEUP, now);
        self.engine.context_switch(cpu, prev, Some(task.id()), now);
        task
    }
}
