//! MAX30102 pulse-oximetry front end.
//!
//! Register encoding for [`PhotodetectorConfig`] and FIFO unpacking are
//! plain functions so they run in host tests. [`Max30102`] drives the part
//! over any `embedded-hal-async` I2C bus.
//!
//! # FIFO Layout
//!
//! The FIFO holds 32 entries. In SpO2 mode each entry is six bytes: three
//! for the red LED followed by three for IR, big-endian, left-aligned to
//! 18 bits regardless of the pulse width (narrower pulses leave the low
//! bits zero).

use embedded_hal_async::i2c::I2c;
use vitals_common::BusError;
use vitals_common::config::OPTICAL_FIFO_DEPTH;
use vitals_common::ports::{LedMode, OpticalSample, PhotodetectorConfig};

use crate::bus::map_i2c_error;

/// Fixed 7-bit bus address.
pub const ADDRESS: u8 = 0x57;

/// Value of the part ID register.
pub const PART_ID: u8 = 0x15;

/// Register map.
pub mod reg {
    pub const INT_STATUS_1: u8 = 0x00;
    pub const INT_ENABLE_1: u8 = 0x02;
    pub const FIFO_WR_PTR: u8 = 0x04;
    pub const OVF_COUNTER: u8 = 0x05;
    pub const FIFO_RD_PTR: u8 = 0x06;
    pub const FIFO_DATA: u8 = 0x07;
    pub const FIFO_CONFIG: u8 = 0x08;
    pub const MODE_CONFIG: u8 = 0x09;
    pub const SPO2_CONFIG: u8 = 0x0A;
    pub const LED1_PA: u8 = 0x0C;
    pub const LED2_PA: u8 = 0x0D;
    pub const PART_ID: u8 = 0xFF;
}

/// MODE_CONFIG soft-reset bit; self-clearing.
pub const MODE_RESET: u8 = 0x40;

/// FIFO_CONFIG rollover bit: a full FIFO overwrites its oldest entry.
pub const FIFO_ROLLOVER: u8 = 0x10;

/// FIFO_CONFIG almost-full level (free slots left when the flag is raised).
pub const FIFO_ALMOST_FULL: u8 = 0x0F;

/// Bytes per FIFO entry with two LEDs active.
pub const BYTES_PER_SAMPLE: usize = 6;

/// ADC resolution is 18 bits.
pub const SAMPLE_MASK: u32 = 0x3_FFFF;

/// How many times to poll MODE_CONFIG after a soft reset.
const RESET_POLLS: u8 = 10;

// =============================================================================
// Register Encoding
// =============================================================================

/// SMP_AVE field for on-chip averaging.
pub const fn averaging_bits(samples: u8) -> Option<u8> {
    match samples {
        1 => Some(0),
        2 => Some(1),
        4 => Some(2),
        8 => Some(3),
        16 => Some(4),
        32 => Some(5),
        _ => None,
    }
}

/// SPO2_SR field.
pub const fn sample_rate_bits(hz: u16) -> Option<u8> {
    match hz {
        50 => Some(0),
        100 => Some(1),
        200 => Some(2),
        400 => Some(3),
        800 => Some(4),
        1000 => Some(5),
        1600 => Some(6),
        3200 => Some(7),
        _ => None,
    }
}

/// LED_PW field. Wider pulses give more ADC resolution.
pub const fn pulse_width_bits(us: u16) -> Option<u8> {
    match us {
        69 => Some(0),
        118 => Some(1),
        215 => Some(2),
        411 => Some(3),
        _ => None,
    }
}

/// SPO2_ADC_RGE field.
pub const fn adc_range_bits(na: u16) -> Option<u8> {
    match na {
        2048 => Some(0),
        4096 => Some(1),
        8192 => Some(2),
        16384 => Some(3),
        _ => None,
    }
}

/// MODE field.
pub const fn mode_bits(mode: LedMode) -> u8 {
    match mode {
        LedMode::RedOnly => 0x02,
        LedMode::RedIr => 0x03,
        LedMode::MultiLed => 0x07,
    }
}

/// Register values for one acquisition configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterPlan {
    pub fifo_config: u8,
    pub mode_config: u8,
    pub spo2_config: u8,
    pub led_amplitude: u8,
}

impl RegisterPlan {
    /// Encode `config`, rejecting values the part does not support.
    pub fn encode(config: &PhotodetectorConfig) -> Result<Self, BusError> {
        let averaging = averaging_bits(config.sample_averaging).ok_or(BusError::InvalidData)?;
        let rate = sample_rate_bits(config.sample_rate_hz).ok_or(BusError::InvalidData)?;
        let width = pulse_width_bits(config.pulse_width_us).ok_or(BusError::InvalidData)?;
        let range = adc_range_bits(config.adc_range_na).ok_or(BusError::InvalidData)?;

        Ok(Self {
            fifo_config: (averaging << 5) | FIFO_ROLLOVER | FIFO_ALMOST_FULL,
            mode_config: mode_bits(config.led_mode),
            spo2_config: (range << 5) | (rate << 2) | width,
            led_amplitude: config.led_brightness,
        })
    }
}

// =============================================================================
// FIFO Decoding
// =============================================================================

/// Entries waiting in the FIFO. Equal pointers mean empty unless the
/// overflow counter shows the FIFO wrapped, in which case it is full.
pub fn pending_samples(
    write_ptr: u8,
    read_ptr: u8,
    overflow: u8,
) -> usize {
    let count = usize::from(write_ptr.wrapping_sub(read_ptr) & 0x1F);
    if count == 0 && overflow != 0 {
        OPTICAL_FIFO_DEPTH
    } else {
        count
    }
}

fn unpack_channel(bytes: &[u8]) -> u32 {
    let raw = (u32::from(bytes[0]) << 16) | (u32::from(bytes[1]) << 8) | u32::from(bytes[2]);
    raw & SAMPLE_MASK
}

/// Decode one six-byte FIFO entry (red then IR).
pub fn unpack_sample(entry: &[u8; BYTES_PER_SAMPLE]) -> OpticalSample {
    OpticalSample {
        red: unpack_channel(&entry[0..3]),
        ir: unpack_channel(&entry[3..6]),
    }
}

// =============================================================================
// Driver
// =============================================================================

pub struct Max30102<I> {
    i2c: I,
}

impl<I: I2c> Max30102<I> {
    pub const fn new(i2c: I) -> Self { Self { i2c } }

    async fn read_reg(
        &mut self,
        register: u8,
    ) -> Result<u8, BusError> {
        let mut value = [0u8];
        self.i2c
            .write_read(ADDRESS, &[register], &mut value)
            .await
            .map_err(map_i2c_error)?;
        Ok(value[0])
    }

    async fn write_reg(
        &mut self,
        register: u8,
        value: u8,
    ) -> Result<(), BusError> {
        self.i2c.write(ADDRESS, &[register, value]).await.map_err(map_i2c_error)
    }

    pub async fn part_id(&mut self) -> Result<u8, BusError> { self.read_reg(reg::PART_ID).await }

    /// True when a MAX30102 answers with the expected part ID.
    pub async fn probe(&mut self) -> bool { matches!(self.part_id().await, Ok(PART_ID)) }

    /// Soft-reset the part, then apply `config` and empty the FIFO.
    pub async fn configure(
        &mut self,
        config: &PhotodetectorConfig,
    ) -> Result<(), BusError> {
        let plan = RegisterPlan::encode(config)?;

        self.write_reg(reg::MODE_CONFIG, MODE_RESET).await?;
        let mut reset_done = false;
        for _ in 0..RESET_POLLS {
            if self.read_reg(reg::MODE_CONFIG).await? & MODE_RESET == 0 {
                reset_done = true;
                break;
            }
        }
        if !reset_done {
            return Err(BusError::Timeout);
        }

        // Data-ready interrupts are not wired; the FIFO is polled
        self.write_reg(reg::INT_ENABLE_1, 0).await?;
        self.write_reg(reg::FIFO_CONFIG, plan.fifo_config).await?;
        self.write_reg(reg::SPO2_CONFIG, plan.spo2_config).await?;
        self.write_reg(reg::LED1_PA, plan.led_amplitude).await?;
        self.write_reg(reg::LED2_PA, plan.led_amplitude).await?;
        self.clear_fifo().await?;
        self.write_reg(reg::MODE_CONFIG, plan.mode_config).await
    }

    pub async fn clear_fifo(&mut self) -> Result<(), BusError> {
        self.write_reg(reg::FIFO_WR_PTR, 0).await?;
        self.write_reg(reg::OVF_COUNTER, 0).await?;
        self.write_reg(reg::FIFO_RD_PTR, 0).await
    }

    /// Read up to `out.len()` entries, oldest first.
    pub async fn read_fifo(
        &mut self,
        out: &mut [OpticalSample],
    ) -> Result<usize, BusError> {
        // WR_PTR, OVF_COUNTER and RD_PTR are consecutive
        let mut pointers = [0u8; 3];
        self.i2c
            .write_read(ADDRESS, &[reg::FIFO_WR_PTR], &mut pointers)
            .await
            .map_err(map_i2c_error)?;

        let count = pending_samples(pointers[0], pointers[2], pointers[1]).min(out.len());
        if count == 0 {
            return Ok(0);
        }

        let mut raw = [0u8; OPTICAL_FIFO_DEPTH * BYTES_PER_SAMPLE];
        let bytes = &mut raw[..count * BYTES_PER_SAMPLE];
        self.i2c
            .write_read(ADDRESS, &[reg::FIFO_DATA], bytes)
            .await
            .map_err(map_i2c_error)?;

        for (slot, entry) in out.iter_mut().zip(bytes.chunks_exact(BYTES_PER_SAMPLE)) {
            let mut fixed = [0u8; BYTES_PER_SAMPLE];
            fixed.copy_from_slice(entry);
            *slot = unpack_sample(&fixed);
        }
        Ok(count)
    }

    /// Cheap presence check: reads the interrupt status register, which
    /// also clears any latched flags.
    pub async fn is_present(&mut self) -> bool { self.read_reg(reg::INT_STATUS_1).await.is_ok() }

    /// Give the bus back.
    pub fn release(self) -> I { self.i2c }
}
