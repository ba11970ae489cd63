//! Centralized clinical threshold configuration.
//!
//! All thresholds are compile-time constants with validation assertions.
//! The fusion engine, the temperature estimator and alert evaluation all read
//! from here so the plausibility bands and alert limits stay consistent.
//!
//! # Compile-Time Validation
//!
//! Each threshold group includes `const` assertions that verify ordering at
//! compile time. If a band is configured backwards (e.g. `LOW > HIGH`),
//! compilation fails.

// =============================================================================
// Signal Quality
// =============================================================================

/// Minimum quality (0-100) a channel reading needs to be used live.
/// Below this, getters report 0 and fusion ignores the channel.
pub const MIN_SIGNAL_QUALITY: u8 = 50;

/// Quality reported for a per-channel value reused from the recent past.
pub const RECENT_VALUE_QUALITY: u8 = 25;

/// Quality reported for the global hold-over value.
pub const HELD_VALUE_QUALITY: u8 = 15;

const _: () = assert!(HELD_VALUE_QUALITY < RECENT_VALUE_QUALITY);
const _: () = assert!(RECENT_VALUE_QUALITY < MIN_SIGNAL_QUALITY);
const _: () = assert!(MIN_SIGNAL_QUALITY <= 100);

// =============================================================================
// Heart Rate
// =============================================================================

/// Lowest heart rate (bpm) any stage will emit.
pub const HR_VALID_MIN: u16 = 25;

/// Highest heart rate (bpm) any stage will emit.
pub const HR_VALID_MAX: u16 = 220;

/// Bradycardia alert limit (strictly below).
pub const HR_LOW: u16 = 50;

/// Tachycardia alert limit (strictly above).
pub const HR_HIGH: u16 = 100;

/// Resting heart rate used until the operator stores a calibrated one.
pub const DEFAULT_RESTING_HR: f32 = 70.0;

/// Accepted range for a stored resting heart rate.
pub const RESTING_HR_MIN: f32 = 30.0;
pub const RESTING_HR_MAX: f32 = 120.0;

const _: () = assert!(HR_VALID_MIN < HR_LOW);
const _: () = assert!(HR_LOW < HR_HIGH);
const _: () = assert!(HR_HIGH < HR_VALID_MAX);
const _: () = assert!(RESTING_HR_MIN < DEFAULT_RESTING_HR);
const _: () = assert!(DEFAULT_RESTING_HR < RESTING_HR_MAX);

// =============================================================================
// SpO2
// =============================================================================

/// Lowest SpO2 (%) any stage will emit.
pub const SPO2_VALID_MIN: u16 = 70;

/// Highest SpO2 (%) any stage will emit.
pub const SPO2_VALID_MAX: u16 = 100;

/// Critical desaturation alert limit (strictly below).
pub const SPO2_CRITICAL: u16 = 90;

/// Low SpO2 warning limit (strictly below).
pub const SPO2_LOW: u16 = 95;

const _: () = assert!(SPO2_VALID_MIN < SPO2_CRITICAL);
const _: () = assert!(SPO2_CRITICAL < SPO2_LOW);
const _: () = assert!(SPO2_LOW <= SPO2_VALID_MAX);

// =============================================================================
// Temperature
// =============================================================================

/// Probe readings must be strictly above this to be believed (C).
pub const TEMP_PROBE_MIN: f32 = 30.0;

/// Probe readings must be strictly below this to be believed (C).
pub const TEMP_PROBE_MAX: f32 = 45.0;

/// Lower clamp for the heart-rate based estimate (C).
pub const TEMP_ESTIMATE_MIN: f32 = 35.0;

/// Upper clamp for the heart-rate based estimate (C).
pub const TEMP_ESTIMATE_MAX: f32 = 42.0;

/// Body temperature assumed at the resting heart rate (C).
pub const TEMP_BASELINE: f32 = 36.5;

/// Hypothermia alert limit (strictly below).
pub const TEMP_LOW: f32 = 35.5;

/// Fever alert limit (strictly above).
pub const TEMP_HIGH: f32 = 38.0;

const _: () = assert!(TEMP_PROBE_MIN < TEMP_ESTIMATE_MIN);
const _: () = assert!(TEMP_ESTIMATE_MIN < TEMP_LOW);
const _: () = assert!(TEMP_LOW < TEMP_BASELINE);
const _: () = assert!(TEMP_BASELINE < TEMP_HIGH);
const _: () = assert!(TEMP_HIGH < TEMP_ESTIMATE_MAX);
const _: () = assert!(TEMP_ESTIMATE_MAX < TEMP_PROBE_MAX);

// =============================================================================
// Helper Functions
// =============================================================================

/// Returns true if a heart rate is inside the physiological band.
#[inline]
pub const fn is_plausible_hr(bpm: u16) -> bool { bpm >= HR_VALID_MIN && bpm <= HR_VALID_MAX }

/// Returns true if an SpO2 value is inside the reportable band.
#[inline]
pub const fn is_plausible_spo2(percent: u16) -> bool { percent >= SPO2_VALID_MIN && percent <= SPO2_VALID_MAX }

/// Returns true if a probe reading is a believable skin/body temperature.
///
/// NaN compares false on both sides and is rejected.
#[inline]
pub fn is_plausible_probe_temp(celsius: f32) -> bool { celsius > TEMP_PROBE_MIN && celsius < TEMP_PROBE_MAX }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hr_band_edges() {
        assert!(!is_plausible_hr(HR_VALID_MIN - 1));
        assert!(is_plausible_hr(HR_VALID_MIN));
        assert!(is_plausible_hr(HR_VALID_MAX));
        assert!(!is_plausible_hr(HR_VALID_MAX + 1));
    }

    #[test]
    fn test_spo2_band_edges() {
        assert!(!is_plausible_spo2(69));
        assert!(is_plausible_spo2(70));
        assert!(is_plausible_spo2(100));
        assert!(!is_plausible_spo2(101));
    }

    #[test]
    fn test_probe_band_is_exclusive() {
        assert!(!is_plausible_probe_temp(30.0), "30.0 is outside the open band");
        assert!(is_plausible_probe_temp(30.1));
        assert!(is_plausible_probe_temp(44.9));
        assert!(!is_plausible_probe_temp(45.0), "45.0 is outside the open band");
        assert!(!is_plausible_probe_temp(-127.0));
        assert!(!is_plausible_probe_temp(f32::NAN));
    }
}
