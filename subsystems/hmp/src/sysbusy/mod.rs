//! # System Busy-State Monitor
//!
//! Classifies global congestion into four levels from a per-cycle profile
//! of CPU business and heavy tasks. Levels rise at once and fall only after
//! the current level's boost duration.
//!
//! ```text
//!   Level0 ──▶ Level1 ──▶ Level2 ──▶ Level3
//!     ▲          │ ▲        │ ▲        │
//!     └──────────┘ └────────┘ └────────┘   (after boost duration)
//! ```
//!
//! At `Level3` the monitor may swap a misfit task stuck on the slowest class
//! with a long-running task on the fastest class (`somac`).

pub mod monitor;
pub mod somac;
pub mod state;

pub use monitor::{SysbusyMonitor, SysbusyProfile};
pub use somac::{SomacOutcome, SwapDescriptor};
pub use state::{SysbusyParams, SysbusyState, NUM_SYSBUSY_STATES};
