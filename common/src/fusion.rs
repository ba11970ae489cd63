//! Per-vital fusion of the two channel readings.
//!
//! Each tick, every vital is fused from channel A (the dual-wavelength
//! optical channel) and channel B (the analog channel) in tiers:
//!
//! | Tier | Condition | Result |
//! |------|-----------|--------|
//! | 1 | both channels valid and agreeing | quality-weighted mean, `Fused` |
//! | 1 | both valid, disagreeing | higher-quality channel verbatim |
//! | 1 | one valid | that channel verbatim |
//! | 2 | a channel was valid within the recent window | last valid value(s), `Held` |
//! | 3 | the last live report is inside the hold window | last live value, `Held` |
//! | - | otherwise | 0 / 0 / `None` |
//!
//! Only tier 1 refreshes the hold timestamp, so a reading never outlives
//! the hold window after the channels go quiet.

use crate::config::{
    FUSION_CHANNEL_RECENT_MS, FUSION_HOLD_WINDOW_MS, FUSION_HR_ABSOLUTE_TOLERANCE,
    FUSION_RELATIVE_TOLERANCE_PCT, FUSION_SPO2_ABSOLUTE_TOLERANCE,
};
use crate::thresholds::{
    HELD_VALUE_QUALITY, HR_VALID_MAX, HR_VALID_MIN, MIN_SIGNAL_QUALITY, RECENT_VALUE_QUALITY,
    SPO2_VALID_MAX, SPO2_VALID_MIN,
};

// =============================================================================
// Readings
// =============================================================================

/// Where a fused value came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Source {
    /// Dual-wavelength optical channel alone.
    ChannelA,
    /// Analog channel alone.
    ChannelB,
    /// Weighted mean of both channels.
    Fused,
    /// Reused value while the channels are not delivering.
    Held,
    /// Nothing to report.
    #[default]
    None,
}

impl Source {
    /// Short label for logs and snapshots.
    pub const fn label(self) -> &'static str {
        match self {
            Self::ChannelA => "OPTICAL",
            Self::ChannelB => "ANALOG",
            Self::Fused => "FUSED",
            Self::Held => "HELD",
            Self::None => "NONE",
        }
    }
}

/// One channel's view of a vital.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelReading {
    pub value: u16,
    /// 0-100
    pub quality: u8,
}

impl ChannelReading {
    pub const NONE: Self = Self::new(0, 0);

    pub const fn new(
        value: u16,
        quality: u8,
    ) -> Self {
        Self { value, quality }
    }
}

/// Result of fusing one vital.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FusedReading {
    pub value: u16,
    pub quality: u8,
    pub source: Source,
}

impl FusedReading {
    pub const NONE: Self = Self {
        value: 0,
        quality: 0,
        source: Source::None,
    };

    /// True when the reading meets the live-quality threshold.
    pub const fn is_trusted(&self) -> bool { self.value > 0 && self.quality >= MIN_SIGNAL_QUALITY }
}

// =============================================================================
// Configuration
// =============================================================================

/// Tuning for one vital's fuser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FusionConfig {
    pub min_quality: u8,
    pub relative_tolerance_pct: u16,
    pub absolute_tolerance: u16,
    pub valid_min: u16,
    pub valid_max: u16,
    pub recent_window_ms: u32,
    pub recent_quality: u8,
    pub hold_window_ms: u32,
    pub hold_quality: u8,
}

impl FusionConfig {
    pub const fn heart_rate() -> Self {
        Self {
            min_quality: MIN_SIGNAL_QUALITY,
            relative_tolerance_pct: FUSION_RELATIVE_TOLERANCE_PCT,
            absolute_tolerance: FUSION_HR_ABSOLUTE_TOLERANCE,
            valid_min: HR_VALID_MIN,
            valid_max: HR_VALID_MAX,
            recent_window_ms: FUSION_CHANNEL_RECENT_MS,
            recent_quality: RECENT_VALUE_QUALITY,
            hold_window_ms: FUSION_HOLD_WINDOW_MS,
            hold_quality: HELD_VALUE_QUALITY,
        }
    }

    pub const fn spo2() -> Self {
        Self {
            absolute_tolerance: FUSION_SPO2_ABSOLUTE_TOLERANCE,
            valid_min: SPO2_VALID_MIN,
            valid_max: SPO2_VALID_MAX,
            ..Self::heart_rate()
        }
    }

    fn accepts(
        &self,
        reading: ChannelReading,
    ) -> bool {
        reading.quality >= self.min_quality && reading.value >= self.valid_min && reading.value <= self.valid_max
    }

    fn agree(
        &self,
        a: u16,
        b: u16,
    ) -> bool {
        let mean = (u32::from(a) + u32::from(b)) / 2;
        let relative = mean * u32::from(self.relative_tolerance_pct) / 100;
        u32::from(a.abs_diff(b)) <= relative.max(u32::from(self.absolute_tolerance))
    }
}

// =============================================================================
// Single-Vital Fuser
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Stamped {
    value: u16,
    at_ms: u32,
}

impl Stamped {
    fn is_younger_than(
        &self,
        now_ms: u32,
        window_ms: u32,
    ) -> bool {
        now_ms.wrapping_sub(self.at_ms) < window_ms
    }
}

/// Fuses one vital and remembers what it needs for hold-over.
#[derive(Clone, Debug)]
pub struct VitalFuser {
    config: FusionConfig,
    last_valid_a: Option<Stamped>,
    last_valid_b: Option<Stamped>,
    last_reported: Option<Stamped>,
}

impl VitalFuser {
    pub const fn new(config: FusionConfig) -> Self {
        Self {
            config,
            last_valid_a: None,
            last_valid_b: None,
            last_reported: None,
        }
    }

    pub fn fuse(
        &mut self,
        a: ChannelReading,
        b: ChannelReading,
        now_ms: u32,
    ) -> FusedReading {
        let a_ok = self.config.accepts(a);
        let b_ok = self.config.accepts(b);

        if a_ok {
            self.last_valid_a = Some(Stamped {
                value: a.value,
                at_ms: now_ms,
            });
        }
        if b_ok {
            self.last_valid_b = Some(Stamped {
                value: b.value,
                at_ms: now_ms,
            });
        }

        let live = match (a_ok, b_ok) {
            (true, true) if self.config.agree(a.value, b.value) => Some(weighted(a, b)),
            // Ties go to channel A
            (true, true) if b.quality > a.quality => Some(verbatim(b, Source::ChannelB)),
            (true, _) => Some(verbatim(a, Source::ChannelA)),
            (false, true) => Some(verbatim(b, Source::ChannelB)),
            (false, false) => None,
        };

        if let Some(reading) = live {
            self.last_reported = Some(Stamped {
                value: reading.value,
                at_ms: now_ms,
            });
            return reading;
        }

        self.hold_over(now_ms)
    }

    fn hold_over(
        &self,
        now_ms: u32,
    ) -> FusedReading {
        let window = self.config.recent_window_ms;
        let recent_a = self.last_valid_a.filter(|s| s.is_younger_than(now_ms, window));
        let recent_b = self.last_valid_b.filter(|s| s.is_younger_than(now_ms, window));

        let recent = match (recent_a, recent_b) {
            (Some(a), Some(b)) => Some(((u32::from(a.value) + u32::from(b.value) + 1) / 2) as u16),
            (Some(s), None) | (None, Some(s)) => Some(s.value),
            (None, None) => None,
        };
        if let Some(value) = recent {
            return FusedReading {
                value,
                quality: self.config.recent_quality,
                source: Source::Held,
            };
        }

        match self.last_reported {
            Some(s) if s.is_younger_than(now_ms, self.config.hold_window_ms) => FusedReading {
                value: s.value,
                quality: self.config.hold_quality,
                source: Source::Held,
            },
            _ => FusedReading::NONE,
        }
    }

    /// Forget every remembered value.
    pub fn reset(&mut self) {
        self.last_valid_a = None;
        self.last_valid_b = None;
        self.last_reported = None;
    }
}

fn weighted(
    a: ChannelReading,
    b: ChannelReading,
) -> FusedReading {
    let qa = u32::from(a.quality);
    let qb = u32::from(b.quality);
    let total = qa + qb;
    let value = (u32::from(a.value) * qa + u32::from(b.value) * qb + total / 2) / total;
    FusedReading {
        value: value as u16,
        quality: (total / 2) as u8,
        source: Source::Fused,
    }
}

const fn verbatim(
    reading: ChannelReading,
    source: Source,
) -> FusedReading {
    FusedReading {
        value: reading.value,
        quality: reading.quality,
        source,
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Heart-rate and SpO2 fusers side by side.
#[derive(Clone, Debug)]
pub struct VitalsFusionEngine {
    heart_rate: VitalFuser,
    spo2: VitalFuser,
}

impl VitalsFusionEngine {
    pub const fn new() -> Self { Self::with_config(FusionConfig::heart_rate(), FusionConfig::spo2()) }

    pub const fn with_config(
        heart_rate: FusionConfig,
        spo2: FusionConfig,
    ) -> Self {
        Self {
            heart_rate: VitalFuser::new(heart_rate),
            spo2: VitalFuser::new(spo2),
        }
    }

    pub fn fuse_heart_rate(
        &mut self,
        a: ChannelReading,
        b: ChannelReading,
        now_ms: u32,
    ) -> FusedReading {
        self.heart_rate.fuse(a, b, now_ms)
    }

    pub fn fuse_spo2(
        &mut self,
        a: ChannelReading,
        b: ChannelReading,
        now_ms: u32,
    ) -> FusedReading {
        self.spo2.fuse(a, b, now_ms)
    }

    pub fn reset(&mut self) {
        self.heart_rate.reset();
        self.spo2.reset();
    }
}

impl Default for VitalsFusionEngine {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn r(
        value: u16,
        quality: u8,
    ) -> ChannelReading {
        ChannelReading::new(value, quality)
    }

    #[test]
    fn test_agreeing_channels_are_weighted() {
        let mut engine = VitalsFusionEngine::new();
        let fused = engine.fuse_heart_rate(r(72, 80), r(75, 70), 0);
        assert_eq!(fused.source, Source::Fused);
        assert_eq!(fused.value, 73);
        assert_eq!(fused.quality, 75);
    }

    #[test]
    fn test_disagreement_picks_confident_channel() {
        let mut engine = VitalsFusionEngine::new();
        let fused = engine.fuse_heart_rate(r(72, 80), r(130, 85), 0);
        assert_eq!(fused.source, Source::ChannelB);
        assert_eq!(fused.value, 130, "disagreeing channels are never averaged");
        assert_eq!(fused.quality, 85);
    }

    #[test]
    fn test_disagreement_tie_goes_to_channel_a() {
        let mut engine = VitalsFusionEngine::new();
        let fused = engine.fuse_heart_rate(r(72, 80), r(130, 80), 0);
        assert_eq!(fused.source, Source::ChannelA);
        assert_eq!(fused.value, 72);
    }

    #[test]
    fn test_absolute_tolerance_at_low_rates() {
        let mut engine = VitalsFusionEngine::new();
        // 10 % of 52 is 5, the 8 bpm floor still counts this as agreement
        let fused = engine.fuse_heart_rate(r(48, 60), r(56, 60), 0);
        assert_eq!(fused.source, Source::Fused);
        assert_eq!(fused.value, 52);
    }

    #[test]
    fn test_spo2_tolerance() {
        let mut engine = VitalsFusionEngine::new();
        let fused = engine.fuse_spo2(r(97, 90), r(94, 60), 0);
        assert_eq!(fused.source, Source::Fused, "3 points apart still agree");
        let fused = engine.fuse_spo2(r(97, 90), r(85, 60), 1_000);
        assert_eq!(fused.source, Source::ChannelA);
        assert_eq!(fused.value, 97);
    }

    #[test]
    fn test_single_valid_channel_passes_through() {
        let mut engine = VitalsFusionEngine::new();
        let fused = engine.fuse_heart_rate(r(0, 0), r(70, 60), 0);
        assert_eq!(fused, FusedReading {
            value: 70,
            quality: 60,
            source: Source::ChannelB,
        });
    }

    #[test]
    fn test_out_of_band_value_ignored() {
        let mut engine = VitalsFusionEngine::new();
        let fused = engine.fuse_heart_rate(r(240, 95), r(70, 60), 0);
        assert_eq!(fused.source, Source::ChannelB);
        assert_eq!(fused.value, 70);
    }

    #[test]
    fn test_low_quality_never_trusted() {
        let mut engine = VitalsFusionEngine::new();
        let fused = engine.fuse_heart_rate(r(72, 49), r(75, 10), 0);
        assert_eq!(fused, FusedReading::NONE);
        assert!(!fused.is_trusted());
    }

    #[test]
    fn test_recent_channel_value_reused() {
        let mut engine = VitalsFusionEngine::new();
        engine.fuse_heart_rate(r(72, 80), r(76, 80), 0);
        let held = engine.fuse_heart_rate(r(0, 0), r(0, 0), 5_000);
        assert_eq!(held.source, Source::Held);
        assert_eq!(held.value, 74, "mean of both last valid values");
        assert_eq!(held.quality, RECENT_VALUE_QUALITY);
        assert!(!held.is_trusted());
    }

    #[test]
    fn test_hold_window_boundaries() {
        let mut engine = VitalsFusionEngine::new();
        let live = engine.fuse_heart_rate(r(72, 80), r(0, 0), 0);
        assert_eq!(live.source, Source::ChannelA);

        let recent = engine.fuse_heart_rate(r(0, 0), r(0, 0), 9_999);
        assert_eq!((recent.value, recent.quality), (72, RECENT_VALUE_QUALITY));

        let held = engine.fuse_heart_rate(r(0, 0), r(0, 0), 12_000);
        assert_eq!(held.source, Source::Held);
        assert_eq!((held.value, held.quality), (72, HELD_VALUE_QUALITY));

        let held = engine.fuse_heart_rate(r(0, 0), r(0, 0), 14_999);
        assert_eq!(held.value, 72, "still inside the hold window");

        let gone = engine.fuse_heart_rate(r(0, 0), r(0, 0), 15_000);
        assert_eq!(gone, FusedReading::NONE, "hold-over never refreshes itself");
    }

    #[test]
    fn test_vitals_fused_independently() {
        let mut engine = VitalsFusionEngine::new();
        engine.fuse_heart_rate(r(72, 80), r(0, 0), 0);
        let spo2 = engine.fuse_spo2(r(0, 0), r(0, 0), 1_000);
        assert_eq!(spo2, FusedReading::NONE, "heart rate history does not leak into SpO2");
    }

    #[test]
    fn test_reset_forgets_history() {
        let mut engine = VitalsFusionEngine::new();
        engine.fuse_heart_rate(r(72, 80), r(75, 80), 0);
        engine.reset();
        assert_eq!(engine.fuse_heart_rate(r(0, 0), r(0, 0), 1_000), FusedReading::NONE);
    }

    #[test]
    fn test_labels() {
        assert_eq!(Source::ChannelA.label(), "OPTICAL");
        assert_eq!(Source::ChannelB.label(), "ANALOG");
        assert_eq!(Source::Fused.label(), "FUSED");
        assert_eq!(Source::Held.label(), "HELD");
        assert_eq!(Source::None.label(), "NONE");
    }
}
