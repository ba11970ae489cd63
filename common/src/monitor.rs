//! Control-loop core: owns the processors and runs them on schedule.
//!
//! Firmware and the simulator both drive a [`VitalsMonitor`] the same way:
//! call [`VitalsMonitor::begin`] once, then [`VitalsMonitor::service`] as
//! often as possible with the current monotonic time. Noteworthy changes
//! (contact, probe fallback, resets) are queued as [`MonitorEvent`]s for
//! the host to log; the queue is bounded and drops its oldest entries.

use heapless::{Deque, Vec};

use crate::analog::{AnalogChannelProcessor, ContactChange};
use crate::config::{ANALOG_SAMPLE_PERIOD_MS, EVENT_QUEUE_SIZE, OPTICAL_POLL_PERIOD_MS, VITALS_UPDATE_PERIOD_MS};
use crate::fusion::VitalsFusionEngine;
use crate::optical::{DualWavelengthChannelProcessor, OpticalEvent};
use crate::ports::{AnalogInput, ContactThermometer, PhotodetectorBus, SettingsStore};
use crate::scheduler::Scheduler;
use crate::temperature::{RestingHrError, TempSource, TemperatureEstimator};
use crate::vitals::{Alert, VitalSigns};

/// Periodic jobs run by the monitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MonitorTask {
    SampleAnalog,
    PollOptical,
    UpdateVitals,
}

const TASK_COUNT: usize = 3;

/// Something the host should know about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MonitorEvent {
    /// Photodetector missing at startup; optical channel disabled.
    OpticalUnavailable,
    /// Analog baseline calibrated (`None` when no usable sample was seen).
    AnalogCalibrated { baseline: Option<u16> },
    FingerPlaced,
    FingerRemoved,
    OpticalLinkLost,
    AnalogContactLost,
    AnalogContactRestored,
    /// Temperature switched to the heart-rate estimate.
    TemperatureEstimated,
    /// Temperature back on the contact probe.
    TemperatureProbe,
    /// Highest-priority alert changed.
    AlertChanged { alert: Option<Alert> },
    /// Operator reset of both channels.
    ChannelsReset,
}

/// Borrowed hardware handles for one service call.
pub struct Sensors<'a, P, A, T> {
    pub photodetector: &'a mut P,
    pub adc: &'a mut A,
    pub thermometer: &'a mut T,
}

pub struct VitalsMonitor {
    analog: AnalogChannelProcessor,
    optical: DualWavelengthChannelProcessor,
    fusion: VitalsFusionEngine,
    temperature: TemperatureEstimator,
    scheduler: Scheduler<MonitorTask, TASK_COUNT>,
    vitals: VitalSigns,
    events: Deque<MonitorEvent, EVENT_QUEUE_SIZE>,
}

impl VitalsMonitor {
    pub fn new() -> Self {
        let mut scheduler = Scheduler::new();
        // TASK_COUNT slots for exactly three tasks
        let _ = scheduler.add(MonitorTask::SampleAnalog, ANALOG_SAMPLE_PERIOD_MS);
        let _ = scheduler.add(MonitorTask::PollOptical, OPTICAL_POLL_PERIOD_MS);
        let _ = scheduler.add(MonitorTask::UpdateVitals, VITALS_UPDATE_PERIOD_MS);

        Self {
            analog: AnalogChannelProcessor::new(),
            optical: DualWavelengthChannelProcessor::new(),
            fusion: VitalsFusionEngine::new(),
            temperature: TemperatureEstimator::new(),
            scheduler,
            vitals: VitalSigns::new(),
            events: Deque::new(),
        }
    }

    /// Bring up both channels and load calibration.
    ///
    /// Returns true when the optical channel is available. The analog
    /// channel always runs, with a default baseline if calibration failed.
    pub fn begin<P, A, S>(
        &mut self,
        photodetector: &mut P,
        adc: &mut A,
        store: &S,
    ) -> bool
    where
        P: PhotodetectorBus,
        A: AnalogInput,
        S: SettingsStore,
    {
        let optical_ok = self.optical.begin(photodetector);
        if !optical_ok {
            self.push_event(MonitorEvent::OpticalUnavailable);
        }

        let calibrated = self.analog.begin(adc);
        let baseline = calibrated.then(|| (self.analog.baseline() + 0.5) as u16);
        self.push_event(MonitorEvent::AnalogCalibrated { baseline });

        self.temperature.load_resting_hr(store);
        optical_ok
    }

    /// Run every task that is due at `now_ms`.
    pub fn service<P, A, T>(
        &mut self,
        sensors: &mut Sensors<'_, P, A, T>,
        now_ms: u32,
    ) -> Vec<MonitorTask, TASK_COUNT>
    where
        P: PhotodetectorBus,
        A: AnalogInput,
        T: ContactThermometer,
    {
        let due = self.scheduler.poll(now_ms);
        for task in due.iter() {
            match task {
                MonitorTask::SampleAnalog => self.sample_analog(&mut *sensors.adc, now_ms),
                MonitorTask::PollOptical => self.poll_optical(&mut *sensors.photodetector, now_ms),
                MonitorTask::UpdateVitals => self.update_vitals(&mut *sensors.thermometer, now_ms),
            }
        }
        due
    }

    fn sample_analog<A: AnalogInput>(
        &mut self,
        adc: &mut A,
        now_ms: u32,
    ) {
        // A failed conversion just skips this sample
        if let Ok(raw) = adc.read_raw() {
            self.analog.update(raw, now_ms);
        }
        match self.analog.take_contact_change() {
            Some(ContactChange::Lost) => self.push_event(MonitorEvent::AnalogContactLost),
            Some(ContactChange::Gained) => self.push_event(MonitorEvent::AnalogContactRestored),
            None => {}
        }
    }

    fn poll_optical<P: PhotodetectorBus>(
        &mut self,
        photodetector: &mut P,
        now_ms: u32,
    ) {
        self.optical.poll(photodetector, now_ms);
        match self.optical.take_event() {
            Some(OpticalEvent::FingerPlaced) => self.push_event(MonitorEvent::FingerPlaced),
            Some(OpticalEvent::FingerRemoved) => self.push_event(MonitorEvent::FingerRemoved),
            Some(OpticalEvent::LinkLost) => self.push_event(MonitorEvent::OpticalLinkLost),
            None => {}
        }
    }

    fn update_vitals<T: ContactThermometer>(
        &mut self,
        thermometer: &mut T,
        now_ms: u32,
    ) {
        // Silent sensors must age out rather than freeze their last reading
        self.analog.tick(now_ms);
        self.optical.tick(now_ms);

        let heart_rate = self
            .fusion
            .fuse_heart_rate(self.optical.hr_reading(), self.analog.hr_reading(), now_ms);
        let spo2 = self
            .fusion
            .fuse_spo2(self.optical.spo2_reading(), self.analog.spo2_reading(), now_ms);
        let temperature = self.temperature.get_temperature(thermometer, heart_rate.value, now_ms);

        let next = VitalSigns::from_parts(heart_rate, spo2, temperature, now_ms);

        if next.temp_source != self.vitals.temp_source {
            self.push_event(match next.temp_source {
                TempSource::Probe => MonitorEvent::TemperatureProbe,
                TempSource::Estimated => MonitorEvent::TemperatureEstimated,
            });
        }
        if next.alert != self.vitals.alert {
            self.push_event(MonitorEvent::AlertChanged { alert: next.alert });
        }

        self.vitals = next;
    }

    fn push_event(
        &mut self,
        event: MonitorEvent,
    ) {
        if self.events.is_full() {
            self.events.pop_front();
        }
        // Room was made above
        let _ = self.events.push_back(event);
    }

    /// Latest snapshot.
    pub const fn vitals(&self) -> &VitalSigns { &self.vitals }

    pub const fn analog(&self) -> &AnalogChannelProcessor { &self.analog }

    pub const fn optical(&self) -> &DualWavelengthChannelProcessor { &self.optical }

    pub const fn temperature(&self) -> &TemperatureEstimator { &self.temperature }

    /// Update the stored resting heart rate used by the estimate.
    pub fn set_resting_hr<S: SettingsStore>(
        &mut self,
        store: &mut S,
        bpm: f32,
    ) -> Result<(), RestingHrError> {
        self.temperature.set_resting_hr(store, bpm)
    }

    /// Operator-triggered recovery: drop all channel and fusion history.
    pub fn reset_channels(&mut self) {
        self.analog.reset();
        self.optical.reset();
        self.fusion.reset();
        self.vitals = VitalSigns::new();
        self.push_event(MonitorEvent::ChannelsReset);
    }

    /// Oldest queued event.
    pub fn next_event(&mut self) -> Option<MonitorEvent> { self.events.pop_front() }

    /// Pop every queued event, oldest first.
    pub fn drain_events(&mut self) -> impl Iterator<Item = MonitorEvent> + '_ {
        core::iter::from_fn(move || self.events.pop_front())
    }
}

impl Default for VitalsMonitor {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BEAT_TIMEOUT_MS, FUSION_HOLD_WINDOW_MS, OPTICAL_LAST_VALID_MS};
    use crate::fusion::Source;
    use crate::ports::DISCONNECTED_CELSIUS;
    use crate::settings::MemorySettings;
    use crate::synth::{OpticalPulse, PulseWave, ScriptedThermometer, SyntheticAdc, SyntheticPhotodetector};

    struct Rig {
        photodetector: SyntheticPhotodetector,
        adc: SyntheticAdc,
        thermometer: ScriptedThermometer<'static>,
        monitor: VitalsMonitor,
        events: std::vec::Vec<MonitorEvent>,
        now: u32,
    }

    impl Rig {
        fn new(
            period_ms: u32,
            temps: &'static [f32],
        ) -> Self {
            let mut rig = Self {
                photodetector: SyntheticPhotodetector::new(OpticalPulse::finger(period_ms)),
                adc: SyntheticAdc::new(PulseWave::analog(period_ms, 800.0)),
                thermometer: ScriptedThermometer::new(temps),
                monitor: VitalsMonitor::new(),
                events: std::vec::Vec::new(),
                now: 0,
            };
            let store: MemorySettings<4> = MemorySettings::new();
            let mut flat = SyntheticAdc::new(PulseWave::analog(period_ms, 0.0));
            rig.monitor.begin(&mut rig.photodetector, &mut flat, &store);
            rig
        }

        /// Advance in 2 ms steps for `duration_ms`.
        fn run(
            &mut self,
            duration_ms: u32,
        ) {
            let end = self.now + duration_ms;
            while self.now < end {
                self.photodetector.advance_to(self.now);
                self.adc.advance_to(self.now);
                let mut sensors = Sensors {
                    photodetector: &mut self.photodetector,
                    adc: &mut self.adc,
                    thermometer: &mut self.thermometer,
                };
                self.monitor.service(&mut sensors, self.now);
                self.events.extend(self.monitor.drain_events());
                self.now += ANALOG_SAMPLE_PERIOD_MS;
            }
        }
    }

    #[test]
    fn test_service_runs_due_tasks() {
        let mut rig = Rig::new(800, &[36.8]);
        let mut sensors = Sensors {
            photodetector: &mut rig.photodetector,
            adc: &mut rig.adc,
            thermometer: &mut rig.thermometer,
        };
        let due = rig.monitor.service(&mut sensors, 0);
        assert_eq!(due.as_slice(), &[
            MonitorTask::SampleAnalog,
            MonitorTask::PollOptical,
            MonitorTask::UpdateVitals
        ]);
        let due = rig.monitor.service(&mut sensors, 2);
        assert_eq!(due.as_slice(), &[MonitorTask::SampleAnalog]);
    }

    #[test]
    fn test_agreeing_channels_fuse() {
        let mut rig = Rig::new(800, &[36.8]);
        rig.run(15_000);

        let vitals = rig.monitor.vitals();
        assert_eq!(vitals.hr_source, Source::Fused);
        assert!(vitals.heart_rate.abs_diff(75) <= 2, "got {}", vitals.heart_rate);
        assert!(vitals.hr_trusted());
        assert!(!vitals.temp_estimated);
        assert_eq!(vitals.temperature_c, 36.8);
        assert!(vitals.spo2_trusted());
        assert!(rig.events.contains(&MonitorEvent::TemperatureProbe));
    }

    #[test]
    fn test_finger_removed_falls_back_to_analog() {
        let mut rig = Rig::new(800, &[36.8]);
        rig.run(15_000);
        rig.photodetector.pulse = OpticalPulse::no_finger();
        rig.run(2_000);

        let vitals = rig.monitor.vitals();
        assert_eq!(vitals.hr_source, Source::ChannelB);
        assert!(vitals.heart_rate.abs_diff(75) <= 2);
        assert!(rig.events.contains(&MonitorEvent::FingerPlaced));
        assert!(rig.events.contains(&MonitorEvent::FingerRemoved));
    }

    #[test]
    fn test_stalled_photodetector_ages_through_hold() {
        let mut rig = Rig::new(800, &[36.8]);
        rig.adc.wave.set_amplitude(0.0);
        rig.run(15_000);
        let vitals = rig.monitor.vitals();
        assert_eq!(vitals.hr_source, Source::ChannelA);
        assert!(vitals.hr_trusted());

        rig.photodetector.stalled = true;
        rig.run(BEAT_TIMEOUT_MS + OPTICAL_LAST_VALID_MS + 1_000);
        assert_eq!(rig.monitor.optical().hr_quality(), 0);
        let vitals = rig.monitor.vitals();
        assert_eq!(vitals.hr_source, Source::Held);
        assert!(vitals.heart_rate.abs_diff(75) <= 2);
        assert!(!vitals.hr_trusted());

        rig.run(FUSION_HOLD_WINDOW_MS);
        let vitals = rig.monitor.vitals();
        assert_eq!(vitals.hr_source, Source::None);
        assert_eq!(vitals.heart_rate, 0);
        assert_eq!(vitals.hr_quality, 0);
    }

    #[test]
    fn test_missing_photodetector_reported() {
        let mut photodetector = SyntheticPhotodetector::new(OpticalPulse::finger(800));
        photodetector.present = false;
        let mut adc = SyntheticAdc::new(PulseWave::analog(800, 0.0));
        let store: MemorySettings<4> = MemorySettings::new();
        let mut monitor = VitalsMonitor::new();

        assert!(!monitor.begin(&mut photodetector, &mut adc, &store));
        assert_eq!(monitor.next_event(), Some(MonitorEvent::OpticalUnavailable));
        assert_eq!(monitor.next_event(), Some(MonitorEvent::AnalogCalibrated { baseline: Some(2000) }));
        assert_eq!(monitor.next_event(), None);
    }

    #[test]
    fn test_probe_loss_switches_to_estimate() {
        let mut rig = Rig::new(800, &[36.8, DISCONNECTED_CELSIUS]);
        rig.run(5_000);
        assert!(!rig.monitor.vitals().temp_estimated);
        rig.events.clear();

        rig.run(40_000);
        let vitals = rig.monitor.vitals();
        assert!(vitals.temp_estimated);
        assert_eq!(vitals.temp_source, TempSource::Estimated);
        assert!(rig.events.contains(&MonitorEvent::TemperatureEstimated));
        assert!(!rig.events.contains(&MonitorEvent::TemperatureProbe));
    }

    #[test]
    fn test_reset_channels_clears_snapshot() {
        let mut rig = Rig::new(800, &[36.8]);
        rig.run(15_000);
        assert!(rig.monitor.vitals().heart_rate > 0);

        rig.monitor.reset_channels();
        assert_eq!(rig.monitor.vitals().heart_rate, 0);
        assert_eq!(rig.monitor.analog().bpm(), 0);
        assert_eq!(rig.monitor.optical().bpm(), 0);
        assert_eq!(rig.monitor.drain_events().last(), Some(MonitorEvent::ChannelsReset));

        // Nothing held over from before the reset
        rig.run(1_000);
        assert_eq!(rig.monitor.vitals().hr_source, Source::None);
    }

    #[test]
    fn test_event_queue_drops_oldest() {
        let mut monitor = VitalsMonitor::new();
        for _ in 0..EVENT_QUEUE_SIZE + 3 {
            monitor.push_event(MonitorEvent::FingerPlaced);
        }
        monitor.push_event(MonitorEvent::ChannelsReset);
        assert_eq!(monitor.drain_events().count(), EVENT_QUEUE_SIZE);
    }
}
