//! Vitals Monitor Firmware for Raspberry Pi Pico 2 (RP2350)
//!
//! Samples an analog PPG front end and a MAX30102 red/IR photodetector,
//! reads a MAX30205 contact probe, and fuses them into one vital-signs
//! snapshot with the `vitals-common` core.
//!
//! # Architecture
//!
//! - Main task: 1 ms ticker driving `VitalsMonitor::service`, which runs
//!   the analog sample (2 ms), optical FIFO poll (10 ms) and vitals update
//!   (1 s) on schedule. Bus transactions are bounded by a 5 ms deadline.
//! - Publish task: reads the latest snapshot from a watch channel and
//!   reports it every 5 s.
//!
//! # Button Controls
//!
//! - **B**: Reset both channels and fusion hold-over
//! - **X**: Dump the on-device event log over RTT
//!
//! Host builds compile a stub `main` so workspace-wide `cargo test` links.

#![cfg_attr(target_arch = "arm", no_std)]
#![cfg_attr(target_arch = "arm", no_main)]
// Crate-level lints (match lib.rs for consistency)
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

#[cfg(target_arch = "arm")]
#[macro_use]
mod logging;

#[cfg(target_arch = "arm")]
mod adapters;
#[cfg(target_arch = "arm")]
mod app;

#[cfg(not(target_arch = "arm"))]
fn main() {
    println!("vitals-pico2 runs on the RP2350; use vitals-simulator on the host");
}
