//! Body temperature from a contact probe, with a heart-rate based estimate
//! whenever the probe has nothing trustworthy to say.
//!
//! The probe is driven through a small non-blocking state machine: a
//! conversion is requested every poll interval and read back on a later
//! tick once the settle time has passed, so the control loop never waits
//! on the sensor. Accepted readings are cached; when the cache runs out the
//! estimator falls back to
//!
//! ```text
//! T = 36.5 + (HR - resting HR) / 10, clamped to [35, 42]
//! ```
//!
//! and flags the reading as estimated.

use crate::config::{
    RESTING_HR_KEY, TEMP_BPM_PER_DEGREE, TEMP_CACHE_MS, TEMP_MAX_REJECTIONS, TEMP_MAX_STEP_C,
    TEMP_POLL_INTERVAL_MS, TEMP_SETTLE_MS,
};
use crate::ports::{ContactThermometer, DISCONNECTED_CELSIUS, SettingsError, SettingsStore};
use crate::thresholds::{
    DEFAULT_RESTING_HR, RESTING_HR_MAX, RESTING_HR_MIN, TEMP_BASELINE, TEMP_ESTIMATE_MAX,
    TEMP_ESTIMATE_MIN, is_plausible_probe_temp,
};

/// Where a temperature reading came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TempSource {
    Probe,
    #[default]
    Estimated,
}

impl TempSource {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Probe => "PROBE",
            Self::Estimated => "ESTIMATED",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TempReading {
    pub celsius: f32,
    pub is_estimated: bool,
    pub source: TempSource,
}

impl TempReading {
    const fn probe(celsius: f32) -> Self {
        Self {
            celsius,
            is_estimated: false,
            source: TempSource::Probe,
        }
    }

    const fn estimated(celsius: f32) -> Self {
        Self {
            celsius,
            is_estimated: true,
            source: TempSource::Estimated,
        }
    }
}

/// Why a stored resting heart rate was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RestingHrError {
    OutOfRange,
    Store(SettingsError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ProbeState {
    Idle,
    Converting { since_ms: u32 },
}

pub struct TemperatureEstimator {
    resting_hr: f32,
    state: ProbeState,
    last_request_ms: Option<u32>,
    /// Last accepted probe reading and when it was taken.
    cached: Option<(f32, u32)>,
    /// Continuity reference; survives cache expiry.
    last_accepted: Option<f32>,
    rejections: u8,
}

impl TemperatureEstimator {
    pub const fn new() -> Self {
        Self {
            resting_hr: DEFAULT_RESTING_HR,
            state: ProbeState::Idle,
            last_request_ms: None,
            cached: None,
            last_accepted: None,
            rejections: 0,
        }
    }

    /// Current temperature.
    ///
    /// Advances the probe state machine, then returns the cached probe
    /// reading if it is fresh or the heart-rate estimate otherwise. A heart
    /// rate of 0 estimates from the resting baseline.
    pub fn get_temperature<T: ContactThermometer>(
        &mut self,
        probe: &mut T,
        heart_rate: u16,
        now_ms: u32,
    ) -> TempReading {
        self.service_probe(probe, now_ms);

        match self.cached {
            Some((celsius, at)) if now_ms.wrapping_sub(at) < TEMP_CACHE_MS => TempReading::probe(celsius),
            _ => TempReading::estimated(self.estimate(heart_rate)),
        }
    }

    fn service_probe<T: ContactThermometer>(
        &mut self,
        probe: &mut T,
        now_ms: u32,
    ) {
        match self.state {
            ProbeState::Idle => {
                let due = self
                    .last_request_ms
                    .is_none_or(|at| now_ms.wrapping_sub(at) >= TEMP_POLL_INTERVAL_MS);
                if due {
                    self.last_request_ms = Some(now_ms);
                    if probe.request_conversion().is_ok() {
                        self.state = ProbeState::Converting { since_ms: now_ms };
                    }
                }
            }
            ProbeState::Converting { since_ms } => {
                if now_ms.wrapping_sub(since_ms) >= TEMP_SETTLE_MS {
                    self.state = ProbeState::Idle;
                    match probe.read_last_celsius() {
                        Ok(celsius) => self.consider(celsius, now_ms),
                        Err(_) => self.reject(),
                    }
                }
            }
        }
    }

    fn consider(
        &mut self,
        celsius: f32,
        now_ms: u32,
    ) {
        if celsius == DISCONNECTED_CELSIUS || !is_plausible_probe_temp(celsius) {
            self.reject();
            return;
        }

        let continuous = self
            .last_accepted
            .is_none_or(|last| (celsius - last).abs() <= TEMP_MAX_STEP_C);
        if !continuous && self.rejections < TEMP_MAX_REJECTIONS {
            self.reject();
            return;
        }

        self.cached = Some((celsius, now_ms));
        self.last_accepted = Some(celsius);
        self.rejections = 0;
    }

    fn reject(&mut self) { self.rejections = self.rejections.saturating_add(1); }

    /// Heart-rate based estimate, clamped to the physiological range.
    pub fn estimate(
        &self,
        heart_rate: u16,
    ) -> f32 {
        if heart_rate == 0 {
            return TEMP_BASELINE;
        }
        let celsius = TEMP_BASELINE + (f32::from(heart_rate) - self.resting_hr) / TEMP_BPM_PER_DEGREE;
        celsius.clamp(TEMP_ESTIMATE_MIN, TEMP_ESTIMATE_MAX)
    }

    /// Load the calibrated resting heart rate, keeping the default when the
    /// stored value is missing or out of range.
    pub fn load_resting_hr<S: SettingsStore>(
        &mut self,
        store: &S,
    ) -> f32 {
        let stored = store.get_float(RESTING_HR_KEY, DEFAULT_RESTING_HR);
        self.resting_hr = if (RESTING_HR_MIN..=RESTING_HR_MAX).contains(&stored) {
            stored
        } else {
            DEFAULT_RESTING_HR
        };
        self.resting_hr
    }

    /// Validate, apply and persist a new resting heart rate.
    pub fn set_resting_hr<S: SettingsStore>(
        &mut self,
        store: &mut S,
        bpm: f32,
    ) -> Result<(), RestingHrError> {
        if !(RESTING_HR_MIN..=RESTING_HR_MAX).contains(&bpm) {
            return Err(RestingHrError::OutOfRange);
        }
        store.put_float(RESTING_HR_KEY, bpm).map_err(RestingHrError::Store)?;
        self.resting_hr = bpm;
        Ok(())
    }

    pub const fn resting_hr(&self) -> f32 { self.resting_hr }

    /// Consecutive probe readings refused so far.
    pub const fn rejections(&self) -> u8 { self.rejections }
}

impl Default for TemperatureEstimator {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::BusError;
    use crate::settings::MemorySettings;
    use crate::synth::ScriptedThermometer;

    /// Call `get_temperature` once a second from `start` up to and including `end`.
    fn tick_until<T: ContactThermometer>(
        est: &mut TemperatureEstimator,
        probe: &mut T,
        hr: u16,
        start: u32,
        end: u32,
    ) -> TempReading {
        let mut reading = est.get_temperature(probe, hr, start);
        let mut t = start + 1_000;
        while t <= end {
            reading = est.get_temperature(probe, hr, t);
            t += 1_000;
        }
        reading
    }

    #[test]
    fn test_probe_reading_used_after_settle() {
        let mut est = TemperatureEstimator::new();
        let mut probe = ScriptedThermometer::new(&[36.8]);

        let first = est.get_temperature(&mut probe, 72, 0);
        assert!(first.is_estimated, "nothing converted yet");
        assert_eq!(probe.conversions, 1);

        let reading = est.get_temperature(&mut probe, 72, 1_000);
        assert_eq!(reading.source, TempSource::Probe);
        assert!(!reading.is_estimated);
        assert_eq!(reading.celsius, 36.8);
    }

    #[test]
    fn test_polls_at_interval() {
        let mut est = TemperatureEstimator::new();
        let mut probe = ScriptedThermometer::new(&[36.8]);
        tick_until(&mut est, &mut probe, 72, 0, 25_000);
        assert_eq!(probe.conversions, 3, "requests at 0, 10 s and 20 s");
    }

    #[test]
    fn test_disconnected_probe_falls_back_to_estimate() {
        let mut est = TemperatureEstimator::new();
        let mut probe = ScriptedThermometer::new(&[36.8, DISCONNECTED_CELSIUS]);

        let reading = tick_until(&mut est, &mut probe, 90, 0, 5_000);
        assert_eq!(reading.source, TempSource::Probe);

        // Sentinel read back at 11, 21, 31 and 41 s; cache from 1 s expires at 31 s
        let reading = tick_until(&mut est, &mut probe, 90, 6_000, 45_000);
        assert_eq!(reading.source, TempSource::Estimated);
        assert!(reading.is_estimated);
        assert_eq!(reading.celsius, 38.5);
        assert_eq!(est.rejections(), 4);
    }

    #[test]
    fn test_cache_lifetime_boundary() {
        let mut est = TemperatureEstimator::new();
        let mut probe = ScriptedThermometer::new(&[36.8, DISCONNECTED_CELSIUS]);
        tick_until(&mut est, &mut probe, 70, 0, 30_000);
        assert_eq!(est.get_temperature(&mut probe, 70, 30_999).source, TempSource::Probe);
        assert_eq!(est.get_temperature(&mut probe, 70, 31_000).source, TempSource::Estimated);
    }

    #[test]
    fn test_out_of_band_readings_rejected() {
        for bad in [29.0, 45.0, 80.0, f32::NAN] {
            let mut est = TemperatureEstimator::new();
            let readings = [bad];
            let mut probe = ScriptedThermometer::new(&readings);
            let reading = tick_until(&mut est, &mut probe, 70, 0, 2_000);
            assert!(reading.is_estimated, "{bad} must not be accepted");
        }
    }

    #[test]
    fn test_jump_accepted_after_repeated_rejection() {
        let mut est = TemperatureEstimator::new();
        let mut probe = ScriptedThermometer::new(&[36.8, 39.5]);

        tick_until(&mut est, &mut probe, 70, 0, 1_000);
        // 39.5 refused at 11, 21 and 31 s
        let reading = tick_until(&mut est, &mut probe, 70, 2_000, 35_000);
        assert!(reading.is_estimated);
        assert_eq!(est.rejections(), 3);

        let reading = tick_until(&mut est, &mut probe, 70, 36_000, 41_000);
        assert_eq!(reading.source, TempSource::Probe);
        assert_eq!(reading.celsius, 39.5);
        assert_eq!(est.rejections(), 0);
    }

    #[test]
    fn test_bus_fault_counts_as_rejection() {
        struct FailingProbe;
        impl ContactThermometer for FailingProbe {
            fn request_conversion(&mut self) -> Result<(), BusError> { Ok(()) }

            fn read_last_celsius(&mut self) -> Result<f32, BusError> { Err(BusError::Timeout) }
        }

        let mut est = TemperatureEstimator::new();
        let reading = tick_until(&mut est, &mut FailingProbe, 70, 0, 1_000);
        assert!(reading.is_estimated);
        assert_eq!(est.rejections(), 1);
    }

    #[test]
    fn test_estimate_formula_and_clamps() {
        let est = TemperatureEstimator::new();
        assert_eq!(est.estimate(70), 36.5);
        assert_eq!(est.estimate(90), 38.5);
        assert_eq!(est.estimate(0), TEMP_BASELINE, "no heart rate uses the baseline");
        assert_eq!(est.estimate(200), TEMP_ESTIMATE_MAX);
        assert_eq!(est.estimate(30), TEMP_ESTIMATE_MIN);
    }

    #[test]
    fn test_resting_hr_roundtrip() {
        let mut store: MemorySettings<4> = MemorySettings::new();
        let mut est = TemperatureEstimator::new();
        assert_eq!(est.load_resting_hr(&store), DEFAULT_RESTING_HR);

        est.set_resting_hr(&mut store, 60.0).unwrap();
        assert_eq!(est.estimate(70), 37.5);

        let mut fresh = TemperatureEstimator::new();
        assert_eq!(fresh.load_resting_hr(&store), 60.0);
    }

    #[test]
    fn test_resting_hr_validated() {
        let mut store: MemorySettings<4> = MemorySettings::new();
        let mut est = TemperatureEstimator::new();
        assert_eq!(est.set_resting_hr(&mut store, 200.0), Err(RestingHrError::OutOfRange));
        assert_eq!(est.resting_hr(), DEFAULT_RESTING_HR);

        store.put_float(RESTING_HR_KEY, 10.0).unwrap();
        assert_eq!(est.load_resting_hr(&store), DEFAULT_RESTING_HR, "bad stored value ignored");
    }
}
