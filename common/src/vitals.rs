//! Published vital-signs snapshot and alert derivation.

use crate::fusion::{FusedReading, Source};
use crate::temperature::{TempReading, TempSource};
use crate::thresholds::{HR_HIGH, HR_LOW, SPO2_CRITICAL, SPO2_LOW, TEMP_BASELINE, TEMP_HIGH, TEMP_LOW};

// =============================================================================
// Alerts
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Condition flagged on a snapshot. Variants are listed in priority order;
/// only the first matching one is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Alert {
    CriticalSpo2,
    NoHeartRate,
    LowSpo2,
    Tachycardia,
    Bradycardia,
    Fever,
    Hypothermia,
    TemperatureEstimated,
}

impl Alert {
    /// Highest-priority alert for a snapshot, if any.
    pub fn evaluate(vitals: &VitalSigns) -> Option<Self> {
        let hr_ok = vitals.hr_trusted();
        let spo2_ok = vitals.spo2_trusted();

        if spo2_ok && u16::from(vitals.spo2) < SPO2_CRITICAL {
            return Some(Self::CriticalSpo2);
        }
        if !hr_ok {
            return Some(Self::NoHeartRate);
        }
        if spo2_ok && u16::from(vitals.spo2) < SPO2_LOW {
            return Some(Self::LowSpo2);
        }
        if vitals.heart_rate > HR_HIGH {
            return Some(Self::Tachycardia);
        }
        if vitals.heart_rate < HR_LOW {
            return Some(Self::Bradycardia);
        }
        if vitals.temperature_c > TEMP_HIGH {
            return Some(Self::Fever);
        }
        if vitals.temperature_c < TEMP_LOW {
            return Some(Self::Hypothermia);
        }
        if vitals.temp_estimated {
            return Some(Self::TemperatureEstimated);
        }
        None
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::CriticalSpo2 => "CRITICAL: Low SpO2",
            Self::NoHeartRate => "WARNING: No heart rate",
            Self::LowSpo2 => "WARNING: SpO2 below normal",
            Self::Tachycardia => "WARNING: High heart rate",
            Self::Bradycardia => "WARNING: Low heart rate",
            Self::Fever => "WARNING: Fever",
            Self::Hypothermia => "WARNING: Low temperature",
            Self::TemperatureEstimated => "INFO: Temperature estimated",
        }
    }

    pub const fn severity(self) -> Severity {
        match self {
            Self::CriticalSpo2 => Severity::Critical,
            Self::TemperatureEstimated => Severity::Info,
            _ => Severity::Warning,
        }
    }

    /// Category tag used when the alert is forwarded upstream.
    pub const fn kind(self) -> &'static str {
        match self {
            Self::CriticalSpo2 => "critical_hypoxia",
            Self::TemperatureEstimated => "temp_estimated",
            _ => "threshold_exceeded",
        }
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Current fused vitals, rebuilt once per update tick.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VitalSigns {
    pub heart_rate: u16,
    pub hr_quality: u8,
    pub hr_source: Source,
    pub spo2: u8,
    pub spo2_quality: u8,
    pub spo2_source: Source,
    pub temperature_c: f32,
    pub temp_estimated: bool,
    pub temp_source: TempSource,
    pub alert: Option<Alert>,
    /// Monotonic time the snapshot was built.
    pub timestamp_ms: u32,
}

impl VitalSigns {
    /// Empty snapshot reported before the first update.
    pub const fn new() -> Self {
        Self {
            heart_rate: 0,
            hr_quality: 0,
            hr_source: Source::None,
            spo2: 0,
            spo2_quality: 0,
            spo2_source: Source::None,
            temperature_c: TEMP_BASELINE,
            temp_estimated: true,
            temp_source: TempSource::Estimated,
            alert: None,
            timestamp_ms: 0,
        }
    }

    pub fn from_parts(
        heart_rate: FusedReading,
        spo2: FusedReading,
        temperature: TempReading,
        timestamp_ms: u32,
    ) -> Self {
        let mut vitals = Self {
            heart_rate: heart_rate.value,
            hr_quality: heart_rate.quality,
            hr_source: heart_rate.source,
            spo2: spo2.value.min(u16::from(u8::MAX)) as u8,
            spo2_quality: spo2.quality,
            spo2_source: spo2.source,
            temperature_c: temperature.celsius,
            temp_estimated: temperature.is_estimated,
            temp_source: temperature.source,
            alert: None,
            timestamp_ms,
        };
        vitals.alert = Alert::evaluate(&vitals);
        vitals
    }

    pub const fn heart_rate_reading(&self) -> FusedReading {
        FusedReading {
            value: self.heart_rate,
            quality: self.hr_quality,
            source: self.hr_source,
        }
    }

    pub const fn spo2_reading(&self) -> FusedReading {
        FusedReading {
            value: self.spo2 as u16,
            quality: self.spo2_quality,
            source: self.spo2_source,
        }
    }

    pub const fn hr_trusted(&self) -> bool { self.heart_rate_reading().is_trusted() }

    pub const fn spo2_trusted(&self) -> bool { self.spo2_reading().is_trusted() }
}

impl Default for VitalSigns {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fused(
        value: u16,
        quality: u8,
    ) -> FusedReading {
        FusedReading {
            value,
            quality,
            source: Source::Fused,
        }
    }

    fn probe(celsius: f32) -> TempReading {
        TempReading {
            celsius,
            is_estimated: false,
            source: TempSource::Probe,
        }
    }

    fn snapshot(
        hr: FusedReading,
        spo2: FusedReading,
        temp: TempReading,
    ) -> VitalSigns {
        VitalSigns::from_parts(hr, spo2, temp, 0)
    }

    #[test]
    fn test_normal_vitals_raise_nothing() {
        let v = snapshot(fused(72, 90), fused(98, 90), probe(36.8));
        assert_eq!(v.alert, None);
    }

    #[test]
    fn test_critical_spo2_beats_missing_hr() {
        let v = snapshot(FusedReading::NONE, fused(85, 90), probe(36.8));
        assert_eq!(v.alert, Some(Alert::CriticalSpo2));
        assert_eq!(v.alert.unwrap().severity(), Severity::Critical);
        assert_eq!(v.alert.unwrap().kind(), "critical_hypoxia");
    }

    #[test]
    fn test_untrusted_hr_is_no_heart_rate() {
        let held = FusedReading {
            value: 72,
            quality: 15,
            source: Source::Held,
        };
        let v = snapshot(held, fused(98, 90), probe(36.8));
        assert_eq!(v.alert, Some(Alert::NoHeartRate));
    }

    #[test]
    fn test_untrusted_low_spo2_ignored() {
        let v = snapshot(fused(72, 90), fused(85, 25), probe(36.8));
        assert_eq!(v.alert, None, "a held SpO2 value never raises a desaturation alert");
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(snapshot(fused(120, 90), fused(93, 90), probe(39.0)).alert, Some(Alert::LowSpo2));
        assert_eq!(snapshot(fused(120, 90), fused(98, 90), probe(39.0)).alert, Some(Alert::Tachycardia));
        assert_eq!(snapshot(fused(45, 90), fused(98, 90), probe(39.0)).alert, Some(Alert::Bradycardia));
        assert_eq!(snapshot(fused(72, 90), fused(98, 90), probe(39.0)).alert, Some(Alert::Fever));
        assert_eq!(snapshot(fused(72, 90), fused(98, 90), probe(35.0)).alert, Some(Alert::Hypothermia));
    }

    #[test]
    fn test_estimated_temperature_is_informational() {
        let temp = TempReading {
            celsius: 36.9,
            is_estimated: true,
            source: TempSource::Estimated,
        };
        let v = snapshot(fused(72, 90), fused(98, 90), temp);
        assert_eq!(v.alert, Some(Alert::TemperatureEstimated));
        assert_eq!(Alert::TemperatureEstimated.severity(), Severity::Info);
    }

    #[test]
    fn test_boundaries_are_strict() {
        assert_eq!(snapshot(fused(100, 90), fused(95, 90), probe(38.0)).alert, None);
        assert_eq!(snapshot(fused(50, 90), fused(90, 90), probe(35.5)).alert, Some(Alert::LowSpo2));
    }

    #[test]
    fn test_empty_snapshot() {
        let v = VitalSigns::new();
        assert_eq!(v.hr_source, Source::None);
        assert!(!v.hr_trusted());
        assert!(v.temp_estimated);
    }
}
