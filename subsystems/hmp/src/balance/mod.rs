//! # Misfit & Balance Engine
//!
//! Moves tasks toward CPUs whose capacity suits them.
//!
//! ```text
//!   little (256)                  big (1024)
//!   ┌──────────┐   idle pull     ┌──────────┐
//!   │ T(900) ◀─┼─────────────────┤  idle    │  dst searches slower domains
//!   │ misfit=1 │                 │          │  only when group busy or misfit
//!   └────┬─────┘                 └──────────┘
//!        │ stopper: Push{T}            ▲
//!        └─────────────────────────────┘  active push on tick
//! ```
//!
//! All movement goes through [`migrate::migrate_task`]; the idle path moves
//! queued tasks synchronously, running tasks are moved by work queued on the
//! source CPU's stopper.

pub mod active_push;
pub mod idle_pull;
pub mod migrate;
pub mod misfit;

pub use idle_pull::PullOutcome;
pub use migrate::{MigrationWork, Stopper};
