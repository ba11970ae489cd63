//! Timing constants for the simulator.
//!
//! These use `std::time::Duration`, which is not available in `no_std`,
//! so they live here rather than in the common crate.

use std::time::Duration;

/// Simulated clock step. Half the analog sample period, matching the
/// firmware loop tick.
pub const STEP_MS: u32 = 1;

/// Wall-clock time per simulated step in `--realtime` mode.
pub const REALTIME_STEP: Duration = Duration::from_millis(STEP_MS as u64);
