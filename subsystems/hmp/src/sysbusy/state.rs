//! # Busy Levels

use crate::NSEC_PER_MSEC;

/// Number of busy levels
pub const NUM_SYSBUSY_STATES: usize = 4;

/// Global congestion level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum SysbusyState {
    /// Idle or lightly loaded
    #[default]
    Level0 = 0,
    /// Half the CPUs busy, or heavy tasks present
    Level1 = 1,
    /// Every CPU busy, or more runnable tasks than CPUs
    Level2 = 2,
    /// Saturated and dominated by heavy tasks
    Level3 = 3,
}

impl SysbusyState {
    /// Convert from the raw level
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Level0,
            1 => Self::Level1,
            2 => Self::Level2,
            _ => Self::Level3,
        }
    }

    /// Index into per-level tables
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Per-level tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysbusyParams {
    /// Ticks between recomputations while in this level
    pub monitor_interval_ticks: u32,
    /// Minimum residency before dropping to a lower level
    pub boost_duration_ns: u64,
}

impl SysbusyParams {
    /// Default table, indexed by level
    pub const DEFAULTS: [SysbusyParams; NUM_SYSBUSY_STATES] = [
        SysbusyParams { monitor_interval_ticks: 1, boost_duration_ns: 0 },
        SysbusyParams { monitor_interval_ticks: 1, boost_duration_ns: 250 * NSEC_PER_MSEC },
        SysbusyParams { monitor_interval_ticks: 25, boost_duration_ns: 250 * NSEC_PER_MSEC },
        SysbusyParams { monitor_interval_ticks: 1, boost_duration_ns: 1000 * NSEC_PER_MSEC },
    ];
}
