//! Single-wavelength analog PPG channel.
//!
//! Consumes raw 12-bit samples at ~500 Hz and turns them into a heart rate,
//! a coarse SpO2 guess and a 0-100 quality score. The pipeline per sample:
//!
//! 1. Clipped samples (near either rail) are replaced by the last good one.
//! 2. Exponential smoothing.
//! 3. Every 10th smoothed sample goes into a 2 s analysis window.
//! 4. Once the window has filled, DC/AC are tracked from its mean and range
//!    and the beat threshold is re-derived at most twice a second. Until
//!    then the calibrated threshold is used and quality rests on beat count.
//! 5. A rising-then-falling crossing of the threshold is a beat.
//! 6. A peak tracker runs alongside and stands in when threshold crossings
//!    stop.
//!
//! Nothing here allocates and every operation is bounded.

use crate::beat::{BeatHistory, BeatLimits, bpm_from_interval};
use crate::config::{
    ANALOG_AC_RETAIN, ANALOG_BACKUP_HISTORY_SIZE, ANALOG_BACKUP_MIN_INTERVAL_MS,
    ANALOG_BACKUP_PEAK_FRACTION, ANALOG_CALIBRATION_SAMPLES, ANALOG_CONTACT_LOSS_MS,
    ANALOG_DC_RETAIN, ANALOG_DECIMATION, ANALOG_DEFAULT_BASELINE, ANALOG_FRESH_BEAT_MS,
    ANALOG_FULL_QUALITY_AC, ANALOG_FULL_SCALE, ANALOG_HISTORY_SIZE,
    ANALOG_INITIAL_THRESHOLD_OFFSET, ANALOG_MAX_BEAT_INTERVAL_MS, ANALOG_MIN_BEAT_INTERVAL_MS,
    ANALOG_MIN_CONTACT_AC, ANALOG_MIN_THRESHOLD_RANGE, ANALOG_PREFILL_TRUSTED_BEATS, ANALOG_PRIMARY_STALE_MS,
    ANALOG_RAIL_MARGIN, ANALOG_SMOOTHING, ANALOG_THRESHOLD_FRACTION, ANALOG_WINDOW_SIZE,
    BEAT_TIMEOUT_MS, RECOMPUTE_INTERVAL_MS,
};
use crate::fusion::ChannelReading;
use crate::ports::AnalogInput;
use crate::ring::{Ring, SampleWindow};
use crate::thresholds::{MIN_SIGNAL_QUALITY, SPO2_VALID_MAX, SPO2_VALID_MIN, is_plausible_hr};

// =============================================================================
// Contact Events
// =============================================================================

/// Skin contact transition reported by a channel processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ContactChange {
    Gained,
    Lost,
}

// =============================================================================
// Backup Peak Tracker
// =============================================================================

/// Streaming local-maximum detector over the smoothed signal.
#[derive(Clone)]
struct PeakTracker {
    prev: f32,
    prev2: f32,
    primed: u8,
    last_peak_ms: Option<u32>,
    intervals: Ring<u32, ANALOG_BACKUP_HISTORY_SIZE>,
}

impl PeakTracker {
    fn new() -> Self {
        Self {
            prev: 0.0,
            prev2: 0.0,
            primed: 0,
            last_peak_ms: None,
            intervals: Ring::new(),
        }
    }

    fn update(
        &mut self,
        sample: f32,
        floor: f32,
        now_ms: u32,
    ) {
        if self.primed >= 2 && self.prev > self.prev2 && self.prev >= sample && self.prev > floor {
            self.register_peak(now_ms);
        }
        self.prev2 = self.prev;
        self.prev = sample;
        if self.primed < 2 {
            self.primed += 1;
        }
    }

    fn register_peak(
        &mut self,
        now_ms: u32,
    ) {
        let Some(last) = self.last_peak_ms else {
            self.last_peak_ms = Some(now_ms);
            return;
        };
        let interval = now_ms.wrapping_sub(last);
        if interval < ANALOG_BACKUP_MIN_INTERVAL_MS {
            return;
        }
        if interval <= ANALOG_MAX_BEAT_INTERVAL_MS {
            self.intervals.push(interval);
        }
        self.last_peak_ms = Some(now_ms);
    }

    /// Rate from the interval ring, or `None` when stale or too shallow.
    fn bpm(
        &self,
        now_ms: u32,
    ) -> Option<u16> {
        let age = now_ms.wrapping_sub(self.last_peak_ms?);
        if age > BEAT_TIMEOUT_MS || self.intervals.len() < 2 {
            return None;
        }
        let count = self.intervals.len() as u32;
        let mean = self.intervals.iter().sum::<u32>() / count;
        let bpm = bpm_from_interval(mean);
        is_plausible_hr(bpm).then_some(bpm)
    }

    fn since_last_peak(
        &self,
        now_ms: u32,
    ) -> Option<u32> {
        self.last_peak_ms.map(|at| now_ms.wrapping_sub(at))
    }

    fn clear(&mut self) { *self = Self::new(); }
}

// =============================================================================
// Analog Channel Processor
// =============================================================================

pub struct AnalogChannelProcessor {
    // Calibration
    baseline: f32,
    last_good: Option<u16>,

    // Filtering
    smoothed: Option<f32>,
    window: SampleWindow<ANALOG_WINDOW_SIZE>,
    decimation_count: u8,
    dc: f32,
    ac: f32,
    tracking: bool,

    // Primary detector
    threshold: f32,
    last_threshold_ms: Option<u32>,
    armed: bool,
    beats: BeatHistory<ANALOG_HISTORY_SIZE>,

    // Backup detector
    peaks: PeakTracker,

    // Contact
    contact: bool,
    low_amplitude_since: Option<u32>,
    pending_change: Option<ContactChange>,

    // Outputs
    quality: u8,
    spo2: u8,
    now_ms: u32,
}

impl AnalogChannelProcessor {
    pub fn new() -> Self {
        Self {
            baseline: ANALOG_DEFAULT_BASELINE,
            last_good: None,
            smoothed: None,
            window: SampleWindow::new(),
            decimation_count: 0,
            dc: ANALOG_DEFAULT_BASELINE,
            ac: 0.0,
            tracking: false,
            threshold: ANALOG_DEFAULT_BASELINE + ANALOG_INITIAL_THRESHOLD_OFFSET,
            last_threshold_ms: None,
            armed: false,
            beats: BeatHistory::new(BeatLimits {
                min_interval_ms: ANALOG_MIN_BEAT_INTERVAL_MS,
                max_interval_ms: ANALOG_MAX_BEAT_INTERVAL_MS,
            }),
            peaks: PeakTracker::new(),
            contact: true,
            low_amplitude_since: None,
            pending_change: None,
            quality: 0,
            spo2: 0,
            now_ms: 0,
        }
    }

    /// Calibrate the resting baseline from the converter.
    ///
    /// Returns true when at least one in-band sample was seen. Otherwise the
    /// mid-scale default is kept.
    pub fn begin<A: AnalogInput>(
        &mut self,
        adc: &mut A,
    ) -> bool {
        let samples = (0..ANALOG_CALIBRATION_SAMPLES).filter_map(|_| adc.read_raw().ok());
        self.seed_baseline(samples)
    }

    /// Calibrate from an explicit sample sequence.
    pub fn seed_baseline<I: IntoIterator<Item = u16>>(
        &mut self,
        samples: I,
    ) -> bool {
        let mut sum: u32 = 0;
        let mut good: u32 = 0;
        for raw in samples.into_iter().take(ANALOG_CALIBRATION_SAMPLES) {
            if !is_clipped(raw) {
                sum += u32::from(raw);
                good += 1;
            }
        }

        let calibrated = good > 0;
        self.baseline = if calibrated {
            sum as f32 / good as f32
        } else {
            ANALOG_DEFAULT_BASELINE
        };
        self.reset();
        calibrated
    }

    /// Feed one raw converter sample taken at `now_ms`.
    pub fn update(
        &mut self,
        raw: u16,
        now_ms: u32,
    ) {
        self.now_ms = now_ms;

        let value = if is_clipped(raw) {
            self.last_good.map_or(self.baseline, f32::from)
        } else {
            self.last_good = Some(raw);
            f32::from(raw)
        };

        let smoothed = match self.smoothed {
            Some(prev) => prev + ANALOG_SMOOTHING * (value - prev),
            None => value,
        };
        self.smoothed = Some(smoothed);

        self.decimation_count += 1;
        if self.decimation_count >= ANALOG_DECIMATION {
            self.decimation_count = 0;
            self.window.push(smoothed);
        }

        self.track_levels(now_ms);
        self.detect_crossing(smoothed, now_ms);
        if self.tracking {
            self.peaks.update(smoothed, self.dc + ANALOG_BACKUP_PEAK_FRACTION * self.ac, now_ms);
        }
        self.track_contact(now_ms);

        self.beats.expire(now_ms);
        self.quality = self.compute_quality(now_ms);
        self.spo2 = self.compute_spo2();
    }

    fn track_levels(
        &mut self,
        now_ms: u32,
    ) {
        let Some(stats) = self.window.stats() else {
            return;
        };

        if self.tracking {
            self.dc = ANALOG_DC_RETAIN * self.dc + (1.0 - ANALOG_DC_RETAIN) * stats.mean;
            self.ac = ANALOG_AC_RETAIN * self.ac + (1.0 - ANALOG_AC_RETAIN) * stats.range();
        } else {
            self.dc = stats.mean;
            self.ac = stats.range();
            self.tracking = true;
        }

        let due = self
            .last_threshold_ms
            .is_none_or(|at| now_ms.wrapping_sub(at) >= RECOMPUTE_INTERVAL_MS);
        if due && stats.range() >= ANALOG_MIN_THRESHOLD_RANGE {
            let level = stats.min + ANALOG_THRESHOLD_FRACTION * stats.range();
            self.threshold = level.clamp(stats.min + 1.0, stats.max - 1.0);
            self.last_threshold_ms = Some(now_ms);
        }
    }

    fn detect_crossing(
        &mut self,
        sample: f32,
        now_ms: u32,
    ) {
        if sample > self.threshold {
            self.armed = true;
        } else if self.armed && sample < self.threshold {
            self.armed = false;
            if self.contact {
                self.beats.register(now_ms);
            }
        }
    }

    fn track_contact(
        &mut self,
        now_ms: u32,
    ) {
        if !self.tracking {
            return;
        }

        if self.ac >= ANALOG_MIN_CONTACT_AC {
            self.low_amplitude_since = None;
            if !self.contact {
                self.contact = true;
                self.pending_change = Some(ContactChange::Gained);
            }
            return;
        }

        let since = *self.low_amplitude_since.get_or_insert(now_ms);
        if self.contact && now_ms.wrapping_sub(since) >= ANALOG_CONTACT_LOSS_MS {
            self.contact = false;
            self.reseed();
            self.pending_change = Some(ContactChange::Lost);
        }
    }

    /// Forget the window, levels and detectors after contact loss.
    ///
    /// Levels are re-seeded from the next full window, which is also what
    /// re-establishes contact.
    fn reseed(&mut self) {
        self.window.clear();
        self.decimation_count = 0;
        self.tracking = false;
        self.dc = self.baseline;
        self.ac = 0.0;
        self.threshold = self.baseline + ANALOG_INITIAL_THRESHOLD_OFFSET;
        self.last_threshold_ms = None;
        self.armed = false;
        self.beats.clear();
        self.peaks.clear();
        self.low_amplitude_since = None;
    }

    fn compute_quality(
        &self,
        now_ms: u32,
    ) -> u8 {
        if !self.contact {
            return 0;
        }

        let since_beat = match (self.beats.since_last_accepted(now_ms), self.peaks.since_last_peak(now_ms)) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => return 0,
        };
        if since_beat > BEAT_TIMEOUT_MS {
            return 0;
        }

        // No amplitude estimate until the window fills; beat count stands in
        let amplitude = if self.tracking {
            40.0 * self.ac.min(ANALOG_FULL_QUALITY_AC) / ANALOG_FULL_QUALITY_AC
        } else {
            let beats = self.beats.len().min(ANALOG_PREFILL_TRUSTED_BEATS);
            20.0 * beats as f32 / ANALOG_PREFILL_TRUSTED_BEATS as f32
        };
        let recency = if since_beat <= ANALOG_FRESH_BEAT_MS {
            30.0
        } else {
            let span = (BEAT_TIMEOUT_MS - ANALOG_FRESH_BEAT_MS) as f32;
            30.0 * (BEAT_TIMEOUT_MS - since_beat) as f32 / span
        };
        let depth = 30.0 * self.beats.len() as f32 / self.beats.capacity() as f32;

        let score = amplitude + recency + depth;
        if score >= 100.0 { 100 } else { score as u8 }
    }

    /// Single-wavelength ratio estimate using the documented constants.
    fn compute_spo2(&self) -> u8 {
        if !self.tracking || self.ac <= 0.0 || self.dc <= 100.0 {
            return 0;
        }
        let ratio = self.ac / self.dc;
        let spo2 = (110.0 - 25.0 * ratio).clamp(f32::from(SPO2_VALID_MIN), f32::from(SPO2_VALID_MAX));
        (spo2 + 0.5) as u8
    }

    /// Move the channel clock to `now_ms` without a new sample.
    ///
    /// Called before reading outputs so a converter that stopped answering
    /// ages the rate out instead of freezing it. Earlier times are ignored.
    pub fn tick(
        &mut self,
        now_ms: u32,
    ) {
        if now_ms.wrapping_sub(self.now_ms) as i32 <= 0 {
            return;
        }
        self.now_ms = now_ms;
        self.beats.expire(now_ms);
        self.quality = self.compute_quality(now_ms);
    }

    // =========================================================================
    // Outputs
    // =========================================================================

    /// Heart rate with layered fallback, or 0 when not trustworthy.
    pub fn bpm(&self) -> u16 {
        if self.quality < MIN_SIGNAL_QUALITY {
            return 0;
        }
        let primary_fresh = self
            .beats
            .since_last_accepted(self.now_ms)
            .is_some_and(|age| age <= ANALOG_PRIMARY_STALE_MS);
        if primary_fresh {
            if let Some(avg) = self.beats.average() {
                return avg;
            }
        }
        self.peaks.bpm(self.now_ms).unwrap_or(0)
    }

    /// Quality of [`Self::bpm`]; 0 whenever the rate is 0.
    pub fn hr_quality(&self) -> u8 {
        if self.bpm() == 0 { 0 } else { self.quality }
    }

    /// SpO2 estimate, or 0 when not trustworthy.
    pub fn spo2(&self) -> u8 {
        if self.quality < MIN_SIGNAL_QUALITY { 0 } else { self.spo2 }
    }

    /// SpO2 quality, discounted for being single-wavelength.
    pub fn spo2_quality(&self) -> u8 {
        if self.spo2() == 0 {
            return 0;
        }
        (u16::from(self.quality) * 3 / 4) as u8
    }

    pub fn hr_reading(&self) -> ChannelReading { ChannelReading::new(self.bpm(), self.hr_quality()) }

    pub fn spo2_reading(&self) -> ChannelReading {
        ChannelReading::new(u16::from(self.spo2()), self.spo2_quality())
    }

    /// Raw signal quality before the trust gate.
    pub const fn signal_quality(&self) -> u8 { self.quality }

    pub const fn has_contact(&self) -> bool { self.contact }

    pub const fn baseline(&self) -> f32 { self.baseline }

    pub const fn threshold(&self) -> f32 { self.threshold }

    pub const fn dc(&self) -> f32 { self.dc }

    pub const fn ac(&self) -> f32 { self.ac }

    pub const fn is_filled(&self) -> bool { self.window.is_filled() }

    /// Take the most recent contact transition, if any.
    pub fn take_contact_change(&mut self) -> Option<ContactChange> { self.pending_change.take() }

    /// Drop all signal history. The calibrated baseline is kept.
    pub fn reset(&mut self) {
        let baseline = self.baseline;
        *self = Self::new();
        self.baseline = baseline;
        self.dc = baseline;
        self.threshold = baseline + ANALOG_INITIAL_THRESHOLD_OFFSET;
    }
}

impl Default for AnalogChannelProcessor {
    fn default() -> Self { Self::new() }
}

/// True when a raw sample sits within the rail margin of either end.
#[inline]
fn is_clipped(raw: u16) -> bool { raw < ANALOG_RAIL_MARGIN || raw > ANALOG_FULL_SCALE - ANALOG_RAIL_MARGIN }
