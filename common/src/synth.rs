//! Synthetic pulse sources and scripted hardware ports.
//!
//! Used by the unit tests and by the desktop simulator to exercise the full
//! pipeline without hardware. Waveforms are a sine at the pulse rate with an
//! optional second harmonic and deterministic pseudo-random noise, so runs
//! are reproducible.

use core::f32::consts::TAU;

use heapless::Deque;
use micromath::F32;

use crate::config::{ANALOG_FULL_SCALE, OPTICAL_FIFO_DEPTH, OPTICAL_SAMPLE_PERIOD_MS};
use crate::ports::{
    AnalogInput, BusError, ContactThermometer, DISCONNECTED_CELSIUS, OpticalSample, PhotodetectorBus,
    PhotodetectorConfig,
};

// =============================================================================
// Waveforms
// =============================================================================

/// Periodic pulse waveform.
#[derive(Clone, Copy, Debug)]
pub struct PulseWave {
    period_ms: u32,
    center: f32,
    /// Peak-to-peak amplitude of the fundamental.
    amplitude: f32,
    /// Second harmonic weight relative to the fundamental.
    harmonic: f32,
    /// Peak noise amplitude.
    noise: f32,
    seed: u32,
}

impl PulseWave {
    pub const fn new(
        period_ms: u32,
        center: f32,
        amplitude: f32,
    ) -> Self {
        Self {
            period_ms,
            center,
            amplitude,
            harmonic: 0.0,
            noise: 0.0,
            seed: 0x1234_5678,
        }
    }

    /// Analog front-end pulse centred in the 12-bit range.
    pub const fn analog(
        period_ms: u32,
        amplitude: f32,
    ) -> Self {
        Self::new(period_ms, 2000.0, amplitude)
    }

    pub const fn with_noise(
        mut self,
        noise: f32,
    ) -> Self {
        self.noise = noise;
        self
    }

    pub const fn with_harmonic(
        mut self,
        harmonic: f32,
    ) -> Self {
        self.harmonic = harmonic;
        self
    }

    pub fn set_period(
        &mut self,
        period_ms: u32,
    ) {
        self.period_ms = period_ms.max(1);
    }

    pub fn set_amplitude(
        &mut self,
        amplitude: f32,
    ) {
        self.amplitude = amplitude;
    }

    pub const fn period_ms(&self) -> u32 { self.period_ms }

    /// Signal value at `t_ms`.
    pub fn value_at(
        &mut self,
        t_ms: u32,
    ) -> f32 {
        let phase = TAU * (t_ms % self.period_ms) as f32 / self.period_ms as f32;
        let half = self.amplitude / 2.0;
        let mut value = self.center + half * F32(phase).sin().0;
        if self.harmonic != 0.0 {
            value += half * self.harmonic * F32(2.0 * phase).sin().0;
        }
        if self.noise != 0.0 {
            value += self.noise * self.next_noise();
        }
        value
    }

    /// Sample quantised to the 12-bit analog converter.
    pub fn analog_sample(
        &mut self,
        t_ms: u32,
    ) -> u16 {
        let value = self.value_at(t_ms).clamp(0.0, f32::from(ANALOG_FULL_SCALE));
        (value + 0.5) as u16
    }

    /// Uniform noise in [-1, 1).
    fn next_noise(&mut self) -> f32 {
        self.seed = self.seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        ((self.seed >> 8) as f32 / (1u32 << 24) as f32) * 2.0 - 1.0
    }
}

/// Red and IR pulses seen through a fingertip.
#[derive(Clone, Copy, Debug)]
pub struct OpticalPulse {
    pub red: PulseWave,
    pub ir: PulseWave,
}

impl OpticalPulse {
    /// Finger on the sensor with a ratio-of-ratios of 0.75 (about 91 % SpO2).
    pub const fn finger(period_ms: u32) -> Self {
        Self {
            red: PulseWave::new(period_ms, 90_000.0, 2_700.0),
            ir: PulseWave::new(period_ms, 120_000.0, 4_800.0),
        }
    }

    /// Ambient light only.
    pub const fn no_finger() -> Self {
        Self {
            red: PulseWave::new(1_000, 2_000.0, 0.0),
            ir: PulseWave::new(1_000, 1_000.0, 0.0),
        }
    }

    pub fn set_period(
        &mut self,
        period_ms: u32,
    ) {
        self.red.set_period(period_ms);
        self.ir.set_period(period_ms);
    }

    pub fn sample_at(
        &mut self,
        t_ms: u32,
    ) -> OpticalSample {
        OpticalSample {
            red: self.red.value_at(t_ms).max(0.0) as u32,
            ir: self.ir.value_at(t_ms).max(0.0) as u32,
        }
    }
}

// =============================================================================
// Synthetic Ports
// =============================================================================

/// Photodetector that fills a FIFO from an [`OpticalPulse`] as time advances.
pub struct SyntheticPhotodetector {
    pub pulse: OpticalPulse,
    /// Whether the device answers on the bus.
    pub present: bool,
    /// Whether FIFO reads fail with a timeout.
    pub stalled: bool,
    fifo: Deque<OpticalSample, OPTICAL_FIFO_DEPTH>,
    next_sample_ms: Option<u32>,
    config: Option<PhotodetectorConfig>,
}

impl SyntheticPhotodetector {
    pub fn new(pulse: OpticalPulse) -> Self {
        Self {
            pulse,
            present: true,
            stalled: false,
            fifo: Deque::new(),
            next_sample_ms: None,
            config: None,
        }
    }

    /// Generate every sample due up to `now_ms`. A full FIFO drops its
    /// oldest entry, as the real part does.
    pub fn advance_to(
        &mut self,
        now_ms: u32,
    ) {
        let mut next = self.next_sample_ms.unwrap_or(now_ms);
        while now_ms.wrapping_sub(next) as i32 >= 0 {
            if self.fifo.is_full() {
                self.fifo.pop_front();
            }
            let sample = self.pulse.sample_at(next);
            // Cannot fail: a slot was freed above
            let _ = self.fifo.push_back(sample);
            next = next.wrapping_add(OPTICAL_SAMPLE_PERIOD_MS);
        }
        self.next_sample_ms = Some(next);
    }

    /// Settings applied by the last successful `configure`.
    pub const fn config(&self) -> Option<PhotodetectorConfig> { self.config }
}

impl PhotodetectorBus for SyntheticPhotodetector {
    fn probe(&mut self) -> bool { self.present }

    fn configure(
        &mut self,
        config: &PhotodetectorConfig,
    ) -> Result<(), BusError> {
        if !self.present {
            return Err(BusError::Nack);
        }
        self.config = Some(*config);
        Ok(())
    }

    fn poll_new_samples(
        &mut self,
        out: &mut [OpticalSample],
    ) -> Result<usize, BusError> {
        if !self.present {
            return Err(BusError::Nack);
        }
        if self.stalled {
            return Err(BusError::Timeout);
        }
        let mut count = 0;
        while count < out.len() {
            let Some(sample) = self.fifo.pop_front() else {
                break;
            };
            out[count] = sample;
            count += 1;
        }
        Ok(count)
    }

    fn is_present_on_bus(&mut self) -> bool { self.present }
}

/// Analog converter sampling a [`PulseWave`] at the current time.
pub struct SyntheticAdc {
    pub wave: PulseWave,
    pub faulted: bool,
    now_ms: u32,
}

impl SyntheticAdc {
    pub const fn new(wave: PulseWave) -> Self {
        Self {
            wave,
            faulted: false,
            now_ms: 0,
        }
    }

    pub fn advance_to(
        &mut self,
        now_ms: u32,
    ) {
        self.now_ms = now_ms;
    }
}

impl AnalogInput for SyntheticAdc {
    fn read_raw(&mut self) -> Result<u16, BusError> {
        if self.faulted {
            return Err(BusError::Timeout);
        }
        Ok(self.wave.analog_sample(self.now_ms))
    }
}

/// Contact probe replaying a script of readings; the last entry repeats.
pub struct ScriptedThermometer<'a> {
    readings: &'a [f32],
    index: usize,
    pub conversions: u32,
}

impl<'a> ScriptedThermometer<'a> {
    pub const fn new(readings: &'a [f32]) -> Self {
        Self {
            readings,
            index: 0,
            conversions: 0,
        }
    }
}

impl ContactThermometer for ScriptedThermometer<'_> {
    fn request_conversion(&mut self) -> Result<(), BusError> {
        self.conversions += 1;
        Ok(())
    }

    fn read_last_celsius(&mut self) -> Result<f32, BusError> {
        let Some(&last) = self.readings.last() else {
            return Ok(DISCONNECTED_CELSIUS);
        };
        let value = self.readings.get(self.index).copied().unwrap_or(last);
        if self.index < self.readings.len() {
            self.index += 1;
        }
        Ok(value)
    }
}
