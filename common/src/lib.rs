//! Signal processing and sensor fusion core for the dual-PPG vitals monitor.
//!
//! This crate is platform-agnostic and shared between the Pico 2 firmware
//! and the desktop simulator:
//!
//! - [`analog`]: single-wavelength analog PPG channel
//! - [`optical`]: dual-wavelength (red + IR) optical channel
//! - [`fusion`]: per-vital fusion of the two channels with hold-over
//! - [`temperature`]: contact probe with heart-rate based fallback
//! - [`vitals`]: published snapshot and alert derivation
//! - [`monitor`]: scheduled control-loop core tying it all together
//! - [`ports`]: hardware traits implemented by firmware and fakes
//! - [`thresholds`] / [`config`]: clinical limits and tuning constants
//!
//! # no_std Compatibility
//!
//! Everything is `no_std`, allocation-free and bounded per call. Time is a
//! `u32` millisecond counter supplied by the caller; rollover is handled
//! with wrapping arithmetic throughout.
//!
//! # Testing
//!
//! ```bash
//! cargo test -p vitals-common
//! ```

// Use no_std only when NOT testing (tests need std for the test harness)
#![cfg_attr(not(test), no_std)]
// Crate-level lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

// Configuration
pub mod config;
pub mod thresholds;

// Building blocks
pub mod beat;
pub mod peaks;
pub mod ring;
pub mod scheduler;

// Hardware boundary
pub mod ports;
pub mod settings;
pub mod synth;

// Processing
pub mod analog;
pub mod fusion;
pub mod optical;
pub mod temperature;

// Control loop
pub mod monitor;
pub mod vitals;

// Re-export commonly used items
pub use analog::AnalogChannelProcessor;
pub use fusion::{ChannelReading, FusedReading, FusionConfig, Source, VitalsFusionEngine};
pub use monitor::{MonitorEvent, MonitorTask, Sensors, VitalsMonitor};
pub use optical::DualWavelengthChannelProcessor;
pub use ports::{AnalogInput, BusError, ContactThermometer, OpticalSample, PhotodetectorBus, SettingsStore};
pub use temperature::{TempReading, TempSource, TemperatureEstimator};
pub use vitals::{Alert, Severity, VitalSigns};
