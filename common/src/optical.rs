//! Dual-wavelength (red + IR) optical channel.
//!
//! Drains the photodetector FIFO, timestamps each sample, and derives heart
//! rate from the IR signal and SpO2 from the red/IR ratio-of-ratios.
//!
//! Heart rate is layered:
//!
//! 1. Primary: threshold crossings of IR against an envelope-derived level.
//! 2. Backup: median peak-to-peak interval over the last 3.2 s of raw IR.
//! 3. Last valid rate from either, for up to 5 s, at low quality.
//!
//! Losing the finger clears all beat state so a new contact never inherits
//! a stale rate.

use crate::beat::{BeatHistory, BeatLimits, BeatOutcome};
use crate::config::{
    BEAT_TIMEOUT_MS, OPTICAL_AC_RETAIN, OPTICAL_BACKUP_MAX_INTERVAL_MS, OPTICAL_BACKUP_MIN_INTERVAL_MS,
    OPTICAL_DC_RETAIN, OPTICAL_ENVELOPE_DECAY, OPTICAL_FIFO_DEPTH, OPTICAL_FULL_SCALE,
    OPTICAL_HISTORY_SIZE, OPTICAL_IR_PRESENCE, OPTICAL_LAST_VALID_MS, OPTICAL_MAX_BEAT_INTERVAL_MS,
    OPTICAL_RAW_DECIMATION, OPTICAL_RAW_WINDOW_SIZE, OPTICAL_RED_PRESENCE, OPTICAL_REFRACTORY_MS,
    OPTICAL_SAMPLE_PERIOD_MS, OPTICAL_THRESHOLD_DC_BAND, RECOMPUTE_INTERVAL_MS,
};
use crate::fusion::ChannelReading;
use crate::peaks::{PeakLimits, TimedSample, window_bpm};
use crate::ports::{OpticalSample, PhotodetectorBus, PhotodetectorConfig};
use crate::ring::Ring;
use crate::thresholds::{SPO2_VALID_MAX, SPO2_VALID_MIN};

/// Backup peak-picking interval band.
const BACKUP_LIMITS: PeakLimits = PeakLimits {
    min_interval_ms: OPTICAL_BACKUP_MIN_INTERVAL_MS,
    max_interval_ms: OPTICAL_BACKUP_MAX_INTERVAL_MS,
};

/// Quality for a rate reused from the last valid estimate.
const LAST_VALID_QUALITY: u8 = 30;

/// Quality discount for the backup estimator.
const BACKUP_QUALITY_PENALTY: u8 = 5;

/// Events surfaced to the control loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpticalEvent {
    FingerPlaced,
    FingerRemoved,
    /// A FIFO read failed and the device no longer answers its address.
    LinkLost,
}

/// Which estimate [`DualWavelengthChannelProcessor::bpm`] is reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RateSource {
    Primary,
    Backup,
    LastValid,
    None,
}

// =============================================================================
// Wavelength Tracker
// =============================================================================

/// DC level and mean absolute AC deviation for one wavelength.
#[derive(Clone, Copy, Debug, Default)]
struct LevelTracker {
    dc: f32,
    ac: f32,
}

impl LevelTracker {
    fn seed(
        &mut self,
        value: f32,
    ) {
        self.dc = value;
        self.ac = 0.0;
    }

    fn update(
        &mut self,
        value: f32,
    ) {
        self.dc = OPTICAL_DC_RETAIN * self.dc + (1.0 - OPTICAL_DC_RETAIN) * value;
        let deviation = (value - self.dc).abs();
        self.ac = OPTICAL_AC_RETAIN * self.ac + (1.0 - OPTICAL_AC_RETAIN) * deviation;
    }

    fn perfusion(&self) -> Option<f32> {
        if self.dc <= 0.0 || self.ac <= 0.0 {
            return None;
        }
        Some(self.ac / self.dc)
    }
}

// =============================================================================
// Dual-Wavelength Channel Processor
// =============================================================================

pub struct DualWavelengthChannelProcessor {
    available: bool,
    finger: bool,
    link_ok: bool,

    // Levels
    red: LevelTracker,
    ir: LevelTracker,
    last_ir: u32,
    peak_envelope: f32,
    trough_envelope: f32,

    // Primary detector
    threshold: Option<f32>,
    last_threshold_ms: Option<u32>,
    armed: bool,
    beats: BeatHistory<OPTICAL_HISTORY_SIZE>,

    // Backup detector
    raw_ir: Ring<TimedSample, OPTICAL_RAW_WINDOW_SIZE>,
    raw_decimation: u8,
    backup_bpm: Option<u16>,
    backup_at_ms: Option<u32>,
    last_backup_run_ms: Option<u32>,

    // Last valid rate from either detector
    last_valid: Option<(u16, u32)>,

    last_sample_ms: Option<u32>,
    now_ms: u32,
    pending_event: Option<OpticalEvent>,
}

impl DualWavelengthChannelProcessor {
    pub fn new() -> Self {
        Self {
            available: false,
            finger: false,
            link_ok: true,
            red: LevelTracker::default(),
            ir: LevelTracker::default(),
            last_ir: 0,
            peak_envelope: 0.0,
            trough_envelope: 0.0,
            threshold: None,
            last_threshold_ms: None,
            armed: false,
            beats: BeatHistory::new(BeatLimits {
                min_interval_ms: OPTICAL_REFRACTORY_MS,
                max_interval_ms: OPTICAL_MAX_BEAT_INTERVAL_MS,
            }),
            raw_ir: Ring::new(),
            raw_decimation: 0,
            backup_bpm: None,
            backup_at_ms: None,
            last_backup_run_ms: None,
            last_valid: None,
            last_sample_ms: None,
            now_ms: 0,
            pending_event: None,
        }
    }

    /// Probe and configure the photodetector.
    ///
    /// On failure the channel stays unavailable for the rest of the session
    /// and every getter reports 0.
    pub fn begin<B: PhotodetectorBus>(
        &mut self,
        bus: &mut B,
    ) -> bool {
        self.available = bus.probe() && bus.configure(&PhotodetectorConfig::finger_clip()).is_ok();
        self.available
    }

    /// Mark the channel usable without touching a bus.
    pub fn assume_available(&mut self) { self.available = true; }

    /// Drain the FIFO and process every new sample.
    ///
    /// Samples arrive in bursts; timestamps are reconstructed backwards from
    /// `now_ms` at the nominal sample period. Returns the number processed.
    pub fn poll<B: PhotodetectorBus>(
        &mut self,
        bus: &mut B,
        now_ms: u32,
    ) -> usize {
        if !self.available {
            return 0;
        }

        let mut buf = [OpticalSample::default(); OPTICAL_FIFO_DEPTH];
        let count = match bus.poll_new_samples(&mut buf) {
            Ok(count) => {
                self.link_ok = true;
                count.min(OPTICAL_FIFO_DEPTH)
            }
            Err(_) => {
                if self.link_ok && !bus.is_present_on_bus() {
                    self.link_ok = false;
                    self.pending_event = Some(OpticalEvent::LinkLost);
                }
                return 0;
            }
        };

        for (i, sample) in buf[..count].iter().enumerate() {
            let back = (count - 1 - i) as u32 * OPTICAL_SAMPLE_PERIOD_MS;
            let mut ts = now_ms.wrapping_sub(back);
            if let Some(last) = self.last_sample_ms {
                if ts.wrapping_sub(last) as i32 <= 0 {
                    ts = last.wrapping_add(1);
                }
            }
            self.update(*sample, ts);
        }
        count
    }

    /// Process one sample pair taken at `ts_ms`.
    pub fn update(
        &mut self,
        sample: OpticalSample,
        ts_ms: u32,
    ) {
        self.now_ms = ts_ms;
        self.last_sample_ms = Some(ts_ms);
        self.last_ir = sample.ir;

        let present = sample.ir >= OPTICAL_IR_PRESENCE && sample.red >= OPTICAL_RED_PRESENCE;
        if !present {
            if self.finger {
                self.finger = false;
                self.clear_signal_state();
                self.pending_event = Some(OpticalEvent::FingerRemoved);
            }
            return;
        }

        if !self.finger {
            self.finger = true;
            self.clear_signal_state();
            self.seed_levels(sample);
            self.pending_event = Some(OpticalEvent::FingerPlaced);
        }

        // Saturated samples carry no pulse information; keep the last levels
        if sample.ir >= OPTICAL_FULL_SCALE || sample.red >= OPTICAL_FULL_SCALE {
            return;
        }

        let ir = sample.ir as f32;
        self.red.update(sample.red as f32);
        self.ir.update(ir);
        self.track_envelope(ir);
        self.update_threshold(ts_ms);
        self.detect_crossing(ir, ts_ms);
        self.record_raw(ir, ts_ms);
        self.update_backup(ts_ms);
        self.beats.expire(ts_ms);
    }

    fn seed_levels(
        &mut self,
        sample: OpticalSample,
    ) {
        let ir = sample.ir as f32;
        self.red.seed(sample.red as f32);
        self.ir.seed(ir);
        self.peak_envelope = ir;
        self.trough_envelope = ir;
    }

    fn track_envelope(
        &mut self,
        ir: f32,
    ) {
        let dc = self.ir.dc;
        if ir > self.peak_envelope {
            self.peak_envelope = ir;
        } else {
            self.peak_envelope -= OPTICAL_ENVELOPE_DECAY * (self.peak_envelope - dc);
        }
        if ir < self.trough_envelope {
            self.trough_envelope = ir;
        } else {
            self.trough_envelope += OPTICAL_ENVELOPE_DECAY * (dc - self.trough_envelope);
        }
    }

    fn update_threshold(
        &mut self,
        now_ms: u32,
    ) {
        let due = self
            .last_threshold_ms
            .is_none_or(|at| now_ms.wrapping_sub(at) >= RECOMPUTE_INTERVAL_MS);
        if !due {
            return;
        }
        let dc = self.ir.dc;
        let band = dc * OPTICAL_THRESHOLD_DC_BAND;
        let midpoint = (self.peak_envelope + self.trough_envelope) / 2.0;
        self.threshold = Some(midpoint.clamp(dc - band, dc + band));
        self.last_threshold_ms = Some(now_ms);
    }

    fn detect_crossing(
        &mut self,
        ir: f32,
        now_ms: u32,
    ) {
        let Some(threshold) = self.threshold else {
            return;
        };
        if ir > threshold {
            self.armed = true;
        } else if self.armed && ir < threshold {
            self.armed = false;
            if let BeatOutcome::Accepted(_) = self.beats.register(now_ms) {
                if let Some(avg) = self.beats.average() {
                    self.last_valid = Some((avg, now_ms));
                }
            }
        }
    }

    fn record_raw(
        &mut self,
        ir: f32,
        now_ms: u32,
    ) {
        self.raw_decimation += 1;
        if self.raw_decimation >= OPTICAL_RAW_DECIMATION {
            self.raw_decimation = 0;
            self.raw_ir.push(TimedSample {
                t_ms: now_ms,
                value: ir,
            });
        }
    }

    fn update_backup(
        &mut self,
        now_ms: u32,
    ) {
        let due = self
            .last_backup_run_ms
            .is_none_or(|at| now_ms.wrapping_sub(at) >= RECOMPUTE_INTERVAL_MS);
        if !due || !self.raw_ir.is_filled() {
            return;
        }
        self.last_backup_run_ms = Some(now_ms);

        if let Some(bpm) = window_bpm(&self.raw_ir, BACKUP_LIMITS) {
            self.backup_bpm = Some(bpm);
            self.backup_at_ms = Some(now_ms);
            if !self.primary_live() {
                self.last_valid = Some((bpm, now_ms));
            }
        }
    }

    fn clear_signal_state(&mut self) {
        self.red = LevelTracker::default();
        self.ir = LevelTracker::default();
        self.peak_envelope = 0.0;
        self.trough_envelope = 0.0;
        self.threshold = None;
        self.last_threshold_ms = None;
        self.armed = false;
        self.beats.clear();
        self.raw_ir.clear();
        self.raw_decimation = 0;
        self.backup_bpm = None;
        self.backup_at_ms = None;
        self.last_backup_run_ms = None;
        self.last_valid = None;
    }

    fn primary_live(&self) -> bool {
        !self.beats.is_empty()
            && self
                .beats
                .since_last_accepted(self.now_ms)
                .is_some_and(|age| age <= BEAT_TIMEOUT_MS)
    }

    fn backup_live(&self) -> bool {
        self.backup_bpm.is_some()
            && self
                .backup_at_ms
                .is_some_and(|at| self.now_ms.wrapping_sub(at) <= BEAT_TIMEOUT_MS)
    }

    /// True while the FIFO has delivered within the beat timeout.
    fn samples_fresh(&self) -> bool {
        self.last_sample_ms
            .is_some_and(|at| self.now_ms.wrapping_sub(at) <= BEAT_TIMEOUT_MS)
    }

    /// IR-level quality step for a live beat source.
    fn signal_step(&self) -> u8 {
        match self.last_ir {
            ir if ir >= 100_000 => 95,
            ir if ir >= 75_000 => 80,
            _ => 60,
        }
    }

    /// Move the channel clock to `now_ms` without a new sample.
    ///
    /// A stalled FIFO delivers nothing, so without this the last rate would
    /// stay live forever. Earlier times are ignored.
    pub fn tick(
        &mut self,
        now_ms: u32,
    ) {
        if now_ms.wrapping_sub(self.now_ms) as i32 <= 0 {
            return;
        }
        self.now_ms = now_ms;
        self.beats.expire(now_ms);
    }

    // =========================================================================
    // Outputs
    // =========================================================================

    /// Which estimate currently backs [`Self::bpm`].
    pub fn rate_source(&self) -> RateSource {
        if !self.available || !self.finger {
            return RateSource::None;
        }
        if self.primary_live() {
            return RateSource::Primary;
        }
        if self.backup_live() {
            return RateSource::Backup;
        }
        match self.last_valid {
            Some((_, at)) if self.now_ms.wrapping_sub(at) <= OPTICAL_LAST_VALID_MS => RateSource::LastValid,
            _ => RateSource::None,
        }
    }

    pub fn bpm(&self) -> u16 {
        match self.rate_source() {
            RateSource::Primary => self.beats.average().unwrap_or(0),
            RateSource::Backup => self.backup_bpm.unwrap_or(0),
            RateSource::LastValid => self.last_valid.map_or(0, |(bpm, _)| bpm),
            RateSource::None => 0,
        }
    }

    pub fn hr_quality(&self) -> u8 {
        match self.rate_source() {
            RateSource::Primary => self.signal_step(),
            RateSource::Backup => self.signal_step() - BACKUP_QUALITY_PENALTY,
            RateSource::LastValid => LAST_VALID_QUALITY,
            RateSource::None => 0,
        }
    }

    /// Ratio-of-ratios SpO2, or 0 when no finger, no pulsatile signal or
    /// no recent samples.
    pub fn spo2(&self) -> u8 {
        if !self.available || !self.finger || !self.samples_fresh() {
            return 0;
        }
        let (Some(red), Some(ir)) = (self.red.perfusion(), self.ir.perfusion()) else {
            return 0;
        };
        let ratio = red / ir;
        let spo2 = (110.0 - 25.0 * ratio).clamp(f32::from(SPO2_VALID_MIN), f32::from(SPO2_VALID_MAX));
        (spo2 + 0.5) as u8
    }

    /// Full step while a beat source is live, halved otherwise.
    pub fn spo2_quality(&self) -> u8 {
        if self.spo2() == 0 {
            return 0;
        }
        let step = self.signal_step();
        if self.primary_live() || self.backup_live() { step } else { step / 2 }
    }

    pub fn hr_reading(&self) -> ChannelReading { ChannelReading::new(self.bpm(), self.hr_quality()) }

    pub fn spo2_reading(&self) -> ChannelReading {
        ChannelReading::new(u16::from(self.spo2()), self.spo2_quality())
    }

    pub const fn is_available(&self) -> bool { self.available }

    pub const fn is_finger_detected(&self) -> bool { self.finger }

    pub const fn last_ir(&self) -> u32 { self.last_ir }

    pub const fn last_sample_ms(&self) -> Option<u32> { self.last_sample_ms }

    pub fn take_event(&mut self) -> Option<OpticalEvent> { self.pending_event.take() }

    /// Drop all signal history. Bus availability is kept.
    pub fn reset(&mut self) {
        let available = self.available;
        *self = Self::new();
        self.available = available;
    }
}

impl Default for DualWavelengthChannelProcessor {
    fn default() -> Self { Self::new() }
}
