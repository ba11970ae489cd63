//! Beat-to-beat interval validation shared by both channel processors.
//!
//! A detector reports "a beat happened now"; [`BeatHistory`] turns that into
//! an instantaneous rate, checks it against the interval gate and the recent
//! history, and keeps the accepted rates for averaging.

use crate::config::{BEAT_TIMEOUT_MS, MAX_RATE_DEVIATION_BPM};
use crate::ring::Ring;
use crate::thresholds::is_plausible_hr;

/// Convert a beat interval to a rounded rate in bpm.
#[inline]
pub fn bpm_from_interval(interval_ms: u32) -> u16 {
    if interval_ms == 0 {
        return 0;
    }
    ((60_000 + interval_ms / 2) / interval_ms) as u16
}

/// Interval gate for a detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BeatLimits {
    pub min_interval_ms: u32,
    pub max_interval_ms: u32,
}

/// What happened to a reported beat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BeatOutcome {
    /// First beat, or the gap was too long to measure; timing restarts here.
    Anchored,
    /// Rate accepted into the history.
    Accepted(u16),
    /// Inside the minimum interval; ignored entirely.
    TooSoon,
    /// Rate rejected as implausible; timing restarts here.
    Rejected(u16),
}

#[derive(Clone)]
pub struct BeatHistory<const N: usize> {
    limits: BeatLimits,
    rates: Ring<u16, N>,
    /// Timing anchor for the next interval.
    last_beat_ms: Option<u32>,
    /// Last beat whose rate made it into the history.
    last_accepted_ms: Option<u32>,
}

impl<const N: usize> BeatHistory<N> {
    pub fn new(limits: BeatLimits) -> Self {
        Self {
            limits,
            rates: Ring::new(),
            last_beat_ms: None,
            last_accepted_ms: None,
        }
    }

    /// Register a detected beat at `now_ms`.
    pub fn register(
        &mut self,
        now_ms: u32,
    ) -> BeatOutcome {
        let Some(last) = self.last_beat_ms else {
            self.last_beat_ms = Some(now_ms);
            return BeatOutcome::Anchored;
        };

        let interval = now_ms.wrapping_sub(last);
        if interval < self.limits.min_interval_ms {
            return BeatOutcome::TooSoon;
        }

        self.last_beat_ms = Some(now_ms);
        if interval > self.limits.max_interval_ms {
            return BeatOutcome::Anchored;
        }

        let bpm = bpm_from_interval(interval);
        if !self.is_consistent(bpm) {
            return BeatOutcome::Rejected(bpm);
        }

        self.rates.push(bpm);
        self.last_accepted_ms = Some(now_ms);
        BeatOutcome::Accepted(bpm)
    }

    /// Band check always; deviation check once the history has some depth.
    fn is_consistent(
        &self,
        bpm: u16,
    ) -> bool {
        if !is_plausible_hr(bpm) {
            return false;
        }
        if self.rates.len() < 2 {
            return true;
        }
        match self.average() {
            Some(mean) => bpm.abs_diff(mean) <= MAX_RATE_DEVIATION_BPM,
            None => true,
        }
    }

    /// Clear the history if no beat was accepted within the timeout.
    ///
    /// Returns true when something was cleared.
    pub fn expire(
        &mut self,
        now_ms: u32,
    ) -> bool {
        match self.last_accepted_ms {
            Some(at) if now_ms.wrapping_sub(at) > BEAT_TIMEOUT_MS => {
                self.clear();
                true
            }
            _ => false,
        }
    }

    /// Rounded mean of the accepted rates.
    pub fn average(&self) -> Option<u16> {
        let count = self.rates.len() as u32;
        if count == 0 {
            return None;
        }
        let sum: u32 = self.rates.iter().map(u32::from).sum();
        Some(((sum + count / 2) / count) as u16)
    }

    /// Milliseconds since the last accepted beat, if there was one.
    pub fn since_last_accepted(
        &self,
        now_ms: u32,
    ) -> Option<u32> {
        self.last_accepted_ms.map(|at| now_ms.wrapping_sub(at))
    }

    pub const fn len(&self) -> usize { self.rates.len() }

    pub const fn is_empty(&self) -> bool { self.rates.is_empty() }

    pub const fn capacity(&self) -> usize { N }

    pub fn clear(&mut self) {
        self.rates.clear();
        self.last_beat_ms = None;
        self.last_accepted_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: BeatLimits = BeatLimits {
        min_interval_ms: 200,
        max_interval_ms: 2_500,
    };

    #[test]
    fn test_bpm_from_interval_rounds() {
        assert_eq!(bpm_from_interval(1000), 60);
        assert_eq!(bpm_from_interval(800), 75);
        assert_eq!(bpm_from_interval(833), 72);
        assert_eq!(bpm_from_interval(0), 0);
    }

    #[test]
    fn test_first_beat_only_anchors() {
        let mut history: BeatHistory<8> = BeatHistory::new(LIMITS);
        assert_eq!(history.register(1_000), BeatOutcome::Anchored);
        assert!(history.is_empty());
        assert_eq!(history.average(), None);
    }

    #[test]
    fn test_regular_beats_accepted() {
        let mut history: BeatHistory<8> = BeatHistory::new(LIMITS);
        history.register(0);
        assert_eq!(history.register(800), BeatOutcome::Accepted(75));
        assert_eq!(history.register(1_600), BeatOutcome::Accepted(75));
        assert_eq!(history.average(), Some(75));
    }

    #[test]
    fn test_too_soon_keeps_anchor() {
        let mut history: BeatHistory<8> = BeatHistory::new(LIMITS);
        history.register(0);
        assert_eq!(history.register(100), BeatOutcome::TooSoon);
        assert_eq!(history.register(1_000), BeatOutcome::Accepted(60), "interval measured from 0");
    }

    #[test]
    fn test_long_gap_reanchors() {
        let mut history: BeatHistory<8> = BeatHistory::new(LIMITS);
        history.register(0);
        assert_eq!(history.register(3_000), BeatOutcome::Anchored);
        assert_eq!(history.register(4_000), BeatOutcome::Accepted(60));
    }

    #[test]
    fn test_outlier_rejected_once_history_exists() {
        let mut history: BeatHistory<8> = BeatHistory::new(LIMITS);
        for t in [0, 1_000, 2_000, 3_000] {
            history.register(t);
        }
        assert_eq!(history.average(), Some(60));
        // 250 ms interval = 240 bpm: outside the band anyway
        assert!(matches!(history.register(3_250), BeatOutcome::Rejected(240)));
        // 450 ms = 133 bpm: in band but 73 away from the mean
        assert!(matches!(history.register(3_700), BeatOutcome::Rejected(133)));
        assert_eq!(history.average(), Some(60), "rejections leave the history alone");
    }

    #[test]
    fn test_expire_after_timeout() {
        let mut history: BeatHistory<8> = BeatHistory::new(LIMITS);
        history.register(0);
        history.register(1_000);
        assert!(!history.expire(4_000), "exactly at the timeout is still live");
        assert!(history.expire(4_001));
        assert!(history.is_empty());
        assert_eq!(history.register(4_500), BeatOutcome::Anchored);
    }

    #[test]
    fn test_wrapping_clock() {
        let mut history: BeatHistory<8> = BeatHistory::new(LIMITS);
        history.register(u32::MAX - 399);
        assert_eq!(history.register(400), BeatOutcome::Accepted(75));
    }
}
