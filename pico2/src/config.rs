//! Board configuration for the Pico 2 vitals monitor.
//!
//! # Wiring
//!
//! | Function                 | Peripheral | Pins                  |
//! |--------------------------|------------|-----------------------|
//! | MAX30102 photodetector   | I2C0       | SDA = GP4, SCL = GP5  |
//! | MAX30205 contact probe   | I2C1       | SDA = GP6, SCL = GP7  |
//! | Analog PPG front end     | ADC0       | GP26                  |
//! | Reset channels button    | GPIO       | GP13 (B, active-low)  |
//! | Dump event log button    | GPIO       | GP14 (X, active-low)  |
//! | Heartbeat LED            | GPIO       | GP25 (on-board)       |
//!
//! Pins are bound by type in `main.rs`; this module only carries the
//! numeric parameters.

use vitals_common::config::ANALOG_SAMPLE_PERIOD_MS;

/// Stock RP2350 system clock.
pub const CPU_FREQ_HZ: u32 = 150_000_000;

/// Both sensors support fast-mode I2C.
pub const I2C_FREQUENCY_HZ: u32 = 400_000;

/// Upper bound on any single bus transaction.
pub const BUS_TIMEOUT_MS: u64 = 5;

/// Photodetector reset and register setup runs once at boot and may take
/// a few dozen transactions.
pub const CONFIGURE_TIMEOUT_MS: u64 = 50;

/// FIFO entries read per poll. 16 entries (96 bytes) take about 2.5 ms at
/// 400 kHz, inside the transaction timeout; the rest wait for the next poll.
pub const FIFO_READ_CHUNK: usize = 16;

/// Main loop wake-up period. Half the analog sample period so the
/// scheduler never sees a sample slot late by a full tick.
pub const LOOP_TICK_US: u64 = 1_000;

/// Work budget for one loop iteration.
pub const LOOP_BUDGET_US: u32 = ANALOG_SAMPLE_PERIOD_MS * 1_000;

/// How often loop-budget statistics are logged.
pub const PROFILE_LOG_INTERVAL_MS: u32 = 10_000;

/// Heartbeat LED toggle period.
pub const HEARTBEAT_PERIOD_MS: u32 = 500;

/// Slots in the RAM settings store.
pub const SETTINGS_CAPACITY: usize = 4;

/// Snapshot subscribers (publisher task plus one spare).
pub const SNAPSHOT_RECEIVERS: usize = 2;

const _: () = assert!(FIFO_READ_CHUNK <= vitals_common::config::OPTICAL_FIFO_DEPTH);
const _: () = assert!(LOOP_TICK_US * 2 <= LOOP_BUDGET_US as u64);
const _: () = assert!(BUS_TIMEOUT_MS * 1_000 < vitals_common::config::OPTICAL_POLL_PERIOD_MS as u64 * 1_000);
