//! Timing and signal-processing configuration constants.
//!
//! All durations are in milliseconds on the monotonic `u32` clock; every
//! elapsed-time computation uses `wrapping_sub` so the ~49.7 day rollover
//! is harmless.

// =============================================================================
// Control Loop Timing
// =============================================================================

/// Analog PPG sampling period (500 Hz).
pub const ANALOG_SAMPLE_PERIOD_MS: u32 = 2;

/// How often the photodetector FIFO is drained.
pub const OPTICAL_POLL_PERIOD_MS: u32 = 10;

/// How often fusion and temperature run and the snapshot is rebuilt.
pub const VITALS_UPDATE_PERIOD_MS: u32 = 1_000;

/// How often the firmware publishes a snapshot upstream.
pub const SNAPSHOT_PUBLISH_PERIOD_MS: u32 = 5_000;

const _: () = assert!(ANALOG_SAMPLE_PERIOD_MS < OPTICAL_POLL_PERIOD_MS);
const _: () = assert!(OPTICAL_POLL_PERIOD_MS < VITALS_UPDATE_PERIOD_MS);
const _: () = assert!(VITALS_UPDATE_PERIOD_MS < SNAPSHOT_PUBLISH_PERIOD_MS);

// =============================================================================
// Analog Channel
// =============================================================================

/// 12-bit converter full scale.
pub const ANALOG_FULL_SCALE: u16 = 4095;

/// Samples within this many counts of either rail count as clipped.
pub const ANALOG_RAIL_MARGIN: u16 = 50;

/// Samples averaged by `begin` to find the resting baseline.
pub const ANALOG_CALIBRATION_SAMPLES: usize = 50;

/// Baseline used when calibration saw no usable sample (mid-scale).
pub const ANALOG_DEFAULT_BASELINE: f32 = 2048.0;

/// Initial beat threshold sits this far above the baseline.
pub const ANALOG_INITIAL_THRESHOLD_OFFSET: f32 = 40.0;

/// Weight of the newest sample in the smoothing filter.
pub const ANALOG_SMOOTHING: f32 = 0.25;

/// Slots in the decimated analysis window.
pub const ANALOG_WINDOW_SIZE: usize = 100;

/// Raw samples per window slot (20 ms/slot, 2 s window).
pub const ANALOG_DECIMATION: u8 = 10;

/// DC tracking weight of the previous estimate.
pub const ANALOG_DC_RETAIN: f32 = 0.98;

/// AC tracking weight of the previous estimate.
pub const ANALOG_AC_RETAIN: f32 = 0.9;

/// Fraction of the window range at which the beat threshold sits.
pub const ANALOG_THRESHOLD_FRACTION: f32 = 0.4;

/// Window range below which the threshold is left alone.
pub const ANALOG_MIN_THRESHOLD_RANGE: f32 = 3.0;

/// Accepted beat-to-beat interval for the analog detector.
pub const ANALOG_MIN_BEAT_INTERVAL_MS: u32 = 200;
pub const ANALOG_MAX_BEAT_INTERVAL_MS: u32 = 2_500;

/// Rate history depth.
pub const ANALOG_HISTORY_SIZE: usize = 8;

/// Backup tracker: local maxima must clear `dc + fraction * ac`.
pub const ANALOG_BACKUP_PEAK_FRACTION: f32 = 0.3;

/// Backup tracker: minimum spacing between accepted maxima.
pub const ANALOG_BACKUP_MIN_INTERVAL_MS: u32 = 250;

/// Backup tracker interval ring depth.
pub const ANALOG_BACKUP_HISTORY_SIZE: usize = 4;

/// Primary detector is considered stale after this long without a beat.
pub const ANALOG_PRIMARY_STALE_MS: u32 = 2_000;

/// AC amplitude below which the sensor is assumed to be off the skin.
pub const ANALOG_MIN_CONTACT_AC: f32 = 20.0;

/// Low amplitude must persist this long before contact is declared lost.
pub const ANALOG_CONTACT_LOSS_MS: u32 = 1_000;

/// AC amplitude that earns the full amplitude share of the quality score.
pub const ANALOG_FULL_QUALITY_AC: f32 = 400.0;

/// Beat recency that still earns the full recency share of the score.
pub const ANALOG_FRESH_BEAT_MS: u32 = 1_500;

/// Accepted beats that earn the full share of the pre-fill quality score.
pub const ANALOG_PREFILL_TRUSTED_BEATS: usize = 4;

const _: () = assert!(ANALOG_RAIL_MARGIN < ANALOG_FULL_SCALE / 2);
const _: () = assert!(ANALOG_MIN_BEAT_INTERVAL_MS < ANALOG_MAX_BEAT_INTERVAL_MS);
const _: () = assert!(ANALOG_BACKUP_MIN_INTERVAL_MS >= ANALOG_MIN_BEAT_INTERVAL_MS);
const _: () = assert!(ANALOG_FRESH_BEAT_MS < BEAT_TIMEOUT_MS);
const _: () = assert!(ANALOG_PRIMARY_STALE_MS < BEAT_TIMEOUT_MS);
const _: () = assert!(ANALOG_PREFILL_TRUSTED_BEATS <= ANALOG_HISTORY_SIZE);

// =============================================================================
// Dual-Wavelength (Optical) Channel
// =============================================================================

/// 18-bit photodetector full scale.
pub const OPTICAL_FULL_SCALE: u32 = 262_143;

/// Minimum IR level for a finger to count as present.
pub const OPTICAL_IR_PRESENCE: u32 = 50_000;

/// Minimum red level for a finger to count as present.
pub const OPTICAL_RED_PRESENCE: u32 = 60_000;

/// Nominal spacing of FIFO samples (100 Hz).
pub const OPTICAL_SAMPLE_PERIOD_MS: u32 = 10;

/// FIFO depth; one poll never returns more than this many samples.
pub const OPTICAL_FIFO_DEPTH: usize = 32;

/// DC tracking weight of the previous estimate.
pub const OPTICAL_DC_RETAIN: f32 = 0.995;

/// AC amplitude tracking weight of the previous estimate.
pub const OPTICAL_AC_RETAIN: f32 = 0.95;

/// Fraction by which the peak/trough envelopes relax toward DC per sample.
pub const OPTICAL_ENVELOPE_DECAY: f32 = 0.01;

/// Beat threshold may not stray further than this fraction from DC.
pub const OPTICAL_THRESHOLD_DC_BAND: f32 = 0.02;

/// Refractory period after an accepted beat.
pub const OPTICAL_REFRACTORY_MS: u32 = 300;

/// Longest beat interval the primary detector accepts.
pub const OPTICAL_MAX_BEAT_INTERVAL_MS: u32 = 2_500;

/// Rate history depth.
pub const OPTICAL_HISTORY_SIZE: usize = 4;

/// Raw IR ring depth for the backup estimator (every 2nd sample, 3.2 s).
pub const OPTICAL_RAW_WINDOW_SIZE: usize = 160;

/// Raw samples per backup ring slot.
pub const OPTICAL_RAW_DECIMATION: u8 = 2;

/// Backup peak picking interval band.
pub const OPTICAL_BACKUP_MIN_INTERVAL_MS: u32 = 300;
pub const OPTICAL_BACKUP_MAX_INTERVAL_MS: u32 = 2_000;

/// A last valid rate is reused (at low quality) for this long.
pub const OPTICAL_LAST_VALID_MS: u32 = 5_000;

const _: () = assert!(OPTICAL_IR_PRESENCE < OPTICAL_FULL_SCALE);
const _: () = assert!(OPTICAL_RED_PRESENCE < OPTICAL_FULL_SCALE);
const _: () = assert!(OPTICAL_BACKUP_MIN_INTERVAL_MS < OPTICAL_BACKUP_MAX_INTERVAL_MS);
const _: () = assert!(OPTICAL_REFRACTORY_MS < OPTICAL_MAX_BEAT_INTERVAL_MS);

// =============================================================================
// Shared Detector Timing
// =============================================================================

/// Beat state clears after this long without an accepted beat.
pub const BEAT_TIMEOUT_MS: u32 = 3_000;

/// Threshold and backup estimates are recomputed at most this often.
pub const RECOMPUTE_INTERVAL_MS: u32 = 500;

/// A new rate may differ from the history mean by at most this much.
pub const MAX_RATE_DEVIATION_BPM: u16 = 45;

// =============================================================================
// Fusion
// =============================================================================

/// Channel readings agree when within this percentage of their mean...
pub const FUSION_RELATIVE_TOLERANCE_PCT: u16 = 10;

/// ...or within this absolute heart-rate difference, whichever is larger.
pub const FUSION_HR_ABSOLUTE_TOLERANCE: u16 = 8;

/// ...or within this absolute SpO2 difference, whichever is larger.
pub const FUSION_SPO2_ABSOLUTE_TOLERANCE: u16 = 3;

/// A channel's last valid value is reused for this long.
pub const FUSION_CHANNEL_RECENT_MS: u32 = 10_000;

/// The last reported value is held for this long once channels drop out.
pub const FUSION_HOLD_WINDOW_MS: u32 = 15_000;

const _: () = assert!(FUSION_CHANNEL_RECENT_MS < FUSION_HOLD_WINDOW_MS);

// =============================================================================
// Temperature
// =============================================================================

/// Contact probe conversion request cadence.
pub const TEMP_POLL_INTERVAL_MS: u32 = 10_000;

/// Time between requesting a conversion and reading the result.
pub const TEMP_SETTLE_MS: u32 = 750;

/// An accepted probe reading stays valid for this long.
pub const TEMP_CACHE_MS: u32 = 30_000;

/// Largest jump between consecutive accepted probe readings.
pub const TEMP_MAX_STEP_C: f32 = 2.0;

/// After this many consecutive rejections the jump limit is waived.
pub const TEMP_MAX_REJECTIONS: u8 = 3;

/// Heart-rate change per degree of temperature change.
pub const TEMP_BPM_PER_DEGREE: f32 = 10.0;

/// Settings key for the calibrated resting heart rate.
pub const RESTING_HR_KEY: &str = "resting_hr";

const _: () = assert!(TEMP_SETTLE_MS < TEMP_POLL_INTERVAL_MS);
const _: () = assert!(TEMP_POLL_INTERVAL_MS < TEMP_CACHE_MS);

// =============================================================================
// Monitor
// =============================================================================

/// Pending events kept for the host; oldest are dropped when full.
pub const EVENT_QUEUE_SIZE: usize = 16;
