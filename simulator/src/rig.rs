//! Simulated hardware: synthetic sensors plus a settable contact probe.

use vitals_common::ports::DISCONNECTED_CELSIUS;
use vitals_common::synth::{OpticalPulse, PulseWave, SyntheticAdc, SyntheticPhotodetector};
use vitals_common::{BusError, ContactThermometer, Sensors};

/// Analog pulse amplitude with good skin contact.
pub const ANALOG_AMPLITUDE: f32 = 800.0;

/// Noise on the analog front end.
pub const ANALOG_NOISE: f32 = 4.0;

/// Contact probe whose reading the scenario sets directly.
pub struct SimProbe {
    /// `None` reads as a disconnected probe.
    pub celsius: Option<f32>,
    pub conversions: u32,
}

impl ContactThermometer for SimProbe {
    fn request_conversion(&mut self) -> Result<(), BusError> {
        self.conversions += 1;
        Ok(())
    }

    fn read_last_celsius(&mut self) -> Result<f32, BusError> { Ok(self.celsius.unwrap_or(DISCONNECTED_CELSIUS)) }
}

pub struct SimRig {
    pub photodetector: SyntheticPhotodetector,
    pub adc: SyntheticAdc,
    pub probe: SimProbe,
    period_ms: u32,
    finger: bool,
}

impl SimRig {
    pub fn new(
        period_ms: u32,
        photodetector_present: bool,
        probe_celsius: Option<f32>,
    ) -> Self {
        let mut photodetector = SyntheticPhotodetector::new(OpticalPulse::finger(period_ms));
        photodetector.present = photodetector_present;
        Self {
            photodetector,
            adc: SyntheticAdc::new(PulseWave::analog(period_ms, ANALOG_AMPLITUDE).with_noise(ANALOG_NOISE)),
            probe: SimProbe {
                celsius: probe_celsius,
                conversions: 0,
            },
            period_ms,
            finger: true,
        }
    }

    pub fn set_finger(
        &mut self,
        on: bool,
    ) {
        self.finger = on;
        self.photodetector.pulse = if on {
            OpticalPulse::finger(self.period_ms)
        } else {
            OpticalPulse::no_finger()
        };
    }

    pub fn set_period(
        &mut self,
        period_ms: u32,
    ) {
        self.period_ms = period_ms;
        self.adc.wave.set_period(period_ms);
        if self.finger {
            self.photodetector.pulse.set_period(period_ms);
        }
    }

    /// Generate every sample due up to `now_ms`.
    pub fn advance_to(
        &mut self,
        now_ms: u32,
    ) {
        self.photodetector.advance_to(now_ms);
        self.adc.advance_to(now_ms);
    }

    pub fn sensors(&mut self) -> Sensors<'_, SyntheticPhotodetector, SyntheticAdc, SimProbe> {
        Sensors {
            photodetector: &mut self.photodetector,
            adc: &mut self.adc,
            thermometer: &mut self.probe,
        }
    }
}

#[cfg(test)]
mod tests {
    use vitals_common::OpticalSample;
    use vitals_common::PhotodetectorBus;

    use super::*;

    #[test]
    fn test_disconnected_probe_reads_sentinel() {
        let mut rig = SimRig::new(800, true, None);
        assert_eq!(rig.probe.read_last_celsius(), Ok(DISCONNECTED_CELSIUS));
        rig.probe.celsius = Some(36.6);
        assert_eq!(rig.probe.read_last_celsius(), Ok(36.6));
    }

    #[test]
    fn test_finger_off_drops_ir_level() {
        let mut rig = SimRig::new(800, true, Some(36.6));
        let mut buf = [OpticalSample::default(); 4];
        rig.set_finger(false);
        rig.advance_to(0);
        assert_eq!(rig.photodetector.poll_new_samples(&mut buf), Ok(1));
        assert!(buf[0].ir < 5_000, "ambient only");
    }
}
