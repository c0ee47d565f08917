//! Background Tasks Module
//!
//! # Tasks
//! - Expiry sweep: evicts expired entries at the configured interval

mod sweeper;

pub use sweeper::{SweepReport, Sweeper, SweeperHandle, SWEEPER_THREAD_NAME};
