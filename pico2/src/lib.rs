//! Vitals monitor firmware library - host-testable pieces of the Pico 2 build.
//!
//! The binary (`main.rs`) owns the peripherals and the Embassy executor;
//! everything here is plain logic over `embedded-hal-async` traits so it
//! runs under the host test harness:
//!
//! - [`max30102`]: photodetector register encoding, FIFO decoding, driver
//! - [`max30205`]: contact thermometer decoding and driver
//! - [`loop_budget`]: DWT cycle counter and per-iteration budget tracking
//! - [`button`]: operator button debounce
//! - [`log_buffer`]: bounded event log dumped on request
//!
//! # Testing
//!
//! ```bash
//! cargo test -p vitals-pico2 --lib --target x86_64-unknown-linux-gnu
//! ```

// Use no_std only when NOT testing (tests need std for the test harness)
#![cfg_attr(not(test), no_std)]
// Crate-level lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod config;

// Sensor drivers
mod bus;
pub mod max30102;
pub mod max30205;

// Runtime support
pub mod button;
pub mod log_buffer;
pub mod loop_budget;

pub use bus::map_i2c_error;
