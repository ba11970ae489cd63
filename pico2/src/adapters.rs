//! Hardware ports for the monitor core.
//!
//! The core calls its ports synchronously from the control loop. Each bus
//! transaction is driven to completion with `block_on` under an
//! `embassy-time` deadline, so a wedged device costs at most
//! [`BUS_TIMEOUT_MS`] before it is reported as [`BusError::Timeout`].

use core::future::Future;

use embassy_futures::block_on;
use embassy_rp::adc::{self, Adc};
use embassy_rp::i2c::{Async, I2c};
use embassy_rp::peripherals::{I2C0, I2C1};
use embassy_time::{Duration, with_timeout};
use vitals_common::ports::{OpticalSample, PhotodetectorConfig};
use vitals_common::{AnalogInput, BusError, ContactThermometer, PhotodetectorBus};
use vitals_pico2::config::{BUS_TIMEOUT_MS, CONFIGURE_TIMEOUT_MS, FIFO_READ_CHUNK};
use vitals_pico2::max30102::Max30102;
use vitals_pico2::max30205::Max30205;

fn bounded_for<F: Future>(
    limit_ms: u64,
    future: F,
) -> Result<F::Output, BusError> {
    block_on(with_timeout(Duration::from_millis(limit_ms), future)).map_err(|_| BusError::Timeout)
}

fn bounded<F: Future>(future: F) -> Result<F::Output, BusError> { bounded_for(BUS_TIMEOUT_MS, future) }

// =============================================================================
// MAX30102 on I2C0
// =============================================================================

pub struct Photodetector {
    driver: Max30102<I2c<'static, I2C0, Async>>,
}

impl Photodetector {
    pub const fn new(bus: I2c<'static, I2C0, Async>) -> Self {
        Self {
            driver: Max30102::new(bus),
        }
    }
}

impl PhotodetectorBus for Photodetector {
    fn probe(&mut self) -> bool { bounded(self.driver.probe()).unwrap_or(false) }

    fn configure(
        &mut self,
        config: &PhotodetectorConfig,
    ) -> Result<(), BusError> {
        bounded_for(CONFIGURE_TIMEOUT_MS, self.driver.configure(config))?
    }

    fn poll_new_samples(
        &mut self,
        out: &mut [OpticalSample],
    ) -> Result<usize, BusError> {
        let limit = out.len().min(FIFO_READ_CHUNK);
        bounded(self.driver.read_fifo(&mut out[..limit]))?
    }

    fn is_present_on_bus(&mut self) -> bool { bounded(self.driver.is_present()).unwrap_or(false) }
}

// =============================================================================
// MAX30205 on I2C1
// =============================================================================

pub struct ContactProbe {
    driver: Max30205<I2c<'static, I2C1, Async>>,
}

impl ContactProbe {
    pub const fn new(bus: I2c<'static, I2C1, Async>) -> Self {
        Self {
            driver: Max30205::new(bus),
        }
    }
}

impl ContactThermometer for ContactProbe {
    fn request_conversion(&mut self) -> Result<(), BusError> { bounded(self.driver.start_one_shot())? }

    fn read_last_celsius(&mut self) -> Result<f32, BusError> { bounded(self.driver.read_celsius())? }
}

// =============================================================================
// Analog PPG on ADC0
// =============================================================================

pub struct AnalogFrontEnd {
    adc: Adc<'static, adc::Blocking>,
    channel: adc::Channel<'static>,
}

impl AnalogFrontEnd {
    pub const fn new(
        adc: Adc<'static, adc::Blocking>,
        channel: adc::Channel<'static>,
    ) -> Self {
        Self { adc, channel }
    }
}

impl AnalogInput for AnalogFrontEnd {
    fn read_raw(&mut self) -> Result<u16, BusError> {
        // A conversion error flags a bad sample, not a missing device
        self.adc.blocking_read(&mut self.channel).map_err(|_| BusError::InvalidData)
    }
}
