//! Hardware-facing interfaces consumed by the processing core.
//!
//! The core never touches a bus directly. Firmware implements these traits
//! over its I2C/ADC drivers; tests and the simulator implement them with
//! scripted fakes. All calls are synchronous and expected to return within
//! a few milliseconds; a slow bus reports [`BusError::Timeout`] instead of
//! blocking the control loop.

use core::fmt;

/// Failure reported by a hardware port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// The transaction did not complete in time.
    Timeout,
    /// The device did not acknowledge its address.
    Nack,
    /// The expected device is not on the bus.
    NotPresent,
    /// The device answered with data that cannot be decoded.
    InvalidData,
}

impl fmt::Display for BusError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "bus timeout"),
            Self::Nack => write!(f, "no acknowledge"),
            Self::NotPresent => write!(f, "device not present"),
            Self::InvalidData => write!(f, "invalid data"),
        }
    }
}

// =============================================================================
// Photodetector
// =============================================================================

/// One red/IR sample pair from the photodetector FIFO.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpticalSample {
    pub red: u32,
    pub ir: u32,
}

/// Which LEDs the photodetector drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedMode {
    RedOnly,
    RedIr,
    MultiLed,
}

/// Acquisition settings applied once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhotodetectorConfig {
    /// LED drive level, 0-255 (roughly 0.2 mA per step).
    pub led_brightness: u8,
    /// On-chip samples averaged per FIFO entry.
    pub sample_averaging: u8,
    pub led_mode: LedMode,
    pub sample_rate_hz: u16,
    pub pulse_width_us: u16,
    /// Full-scale ADC range in nA.
    pub adc_range_na: u16,
}

impl PhotodetectorConfig {
    /// Settings the optical processor is tuned for: 100 Hz effective rate
    /// with red and IR interleaved.
    pub const fn finger_clip() -> Self {
        Self {
            led_brightness: 60,
            sample_averaging: 4,
            led_mode: LedMode::RedIr,
            sample_rate_hz: 400,
            pulse_width_us: 411,
            adc_range_na: 4096,
        }
    }

    /// FIFO entries per second after on-chip averaging.
    pub const fn effective_rate_hz(&self) -> u16 {
        if self.sample_averaging == 0 {
            return self.sample_rate_hz;
        }
        self.sample_rate_hz / self.sample_averaging as u16
    }
}

impl Default for PhotodetectorConfig {
    fn default() -> Self { Self::finger_clip() }
}

/// Dual-wavelength (red + IR) reflective photodetector on a shared bus.
pub trait PhotodetectorBus {
    /// Check the device identity. Called once at startup.
    fn probe(&mut self) -> bool;

    /// Apply acquisition settings.
    fn configure(
        &mut self,
        config: &PhotodetectorConfig,
    ) -> Result<(), BusError>;

    /// Copy samples that arrived since the last poll into `out`, oldest
    /// first, and return how many were written.
    fn poll_new_samples(
        &mut self,
        out: &mut [OpticalSample],
    ) -> Result<usize, BusError>;

    /// Quick address check without touching the FIFO.
    fn is_present_on_bus(&mut self) -> bool;
}

// =============================================================================
// Analog Front End
// =============================================================================

/// Single-channel analog PPG sensor behind a 12-bit converter.
pub trait AnalogInput {
    fn read_raw(&mut self) -> Result<u16, BusError>;
}

// =============================================================================
// Contact Thermometer
// =============================================================================

/// Value a disconnected probe reports instead of a temperature.
pub const DISCONNECTED_CELSIUS: f32 = -127.0;

/// Contact temperature probe with a request/read conversion cycle.
pub trait ContactThermometer {
    /// Start a conversion. The result is ready after the settle time.
    fn request_conversion(&mut self) -> Result<(), BusError>;

    /// Read the most recent conversion. A disconnected probe returns
    /// [`DISCONNECTED_CELSIUS`].
    fn read_last_celsius(&mut self) -> Result<f32, BusError>;
}

// =============================================================================
// Settings Store
// =============================================================================

/// Why a setting could not be stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsError {
    /// No room for another key.
    Full,
    /// Key longer than the store supports.
    KeyTooLong,
    /// The backing medium refused the write.
    WriteFailed,
}

/// Persistent key/value store for calibration values.
pub trait SettingsStore {
    /// Stored value for `key`, or `default` when absent.
    fn get_float(
        &self,
        key: &str,
        default: f32,
    ) -> f32;

    fn put_float(
        &mut self,
        key: &str,
        value: f32,
    ) -> Result<(), SettingsError>;
}
