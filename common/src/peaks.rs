//! Window-based heart rate from raw IR samples.
//!
//! Picks local maxima in the upper two thirds of a filled window, merges
//! maxima that are too close to be separate beats, and reports the median
//! peak-to-peak interval as a rate. Used as a backup when the threshold
//! detector goes quiet.

use heapless::Vec;

use crate::beat::bpm_from_interval;
use crate::ring::Ring;
use crate::thresholds::is_plausible_hr;

/// Most peaks considered in one window.
const MAX_PEAKS: usize = 24;

/// One raw sample with its reconstructed timestamp.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimedSample {
    pub t_ms: u32,
    pub value: f32,
}

/// Interval band for peak picking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeakLimits {
    pub min_interval_ms: u32,
    pub max_interval_ms: u32,
}

/// Median-interval rate over a filled window, or `None`.
pub fn window_bpm<const N: usize>(
    window: &Ring<TimedSample, N>,
    limits: PeakLimits,
) -> Option<u16> {
    if !window.is_filled() {
        return None;
    }

    let (min, max) = window.iter().fold((f32::MAX, f32::MIN), |(lo, hi), s| (lo.min(s.value), hi.max(s.value)));
    let range = max - min;
    if range <= 0.0 {
        return None;
    }
    let floor = min + range / 3.0;

    let peaks = pick_peaks(window, floor, limits.min_interval_ms);
    if peaks.len() < 2 {
        return None;
    }

    let mut intervals: Vec<u32, MAX_PEAKS> = Vec::new();
    for pair in peaks.windows(2) {
        let interval = pair[1].t_ms.wrapping_sub(pair[0].t_ms);
        if interval >= limits.min_interval_ms && interval <= limits.max_interval_ms {
            // Fewer intervals than peaks, capacity is never exceeded
            let _ = intervals.push(interval);
        }
    }

    let median = median(&mut intervals)?;
    let bpm = bpm_from_interval(median);
    is_plausible_hr(bpm).then_some(bpm)
}

fn pick_peaks<const N: usize>(
    window: &Ring<TimedSample, N>,
    floor: f32,
    min_spacing_ms: u32,
) -> Vec<TimedSample, MAX_PEAKS> {
    let mut peaks: Vec<TimedSample, MAX_PEAKS> = Vec::new();
    let mut samples = window.iter();
    let (Some(mut prev), Some(mut cur)) = (samples.next(), samples.next()) else {
        return peaks;
    };

    for next in samples {
        if cur.value > prev.value && cur.value >= next.value && cur.value > floor {
            match peaks.last_mut() {
                Some(last) if cur.t_ms.wrapping_sub(last.t_ms) < min_spacing_ms => {
                    if cur.value > last.value {
                        *last = cur;
                    }
                }
                _ => {
                    if peaks.push(cur).is_err() {
                        break;
                    }
                }
            }
        }
        prev = cur;
        cur = next;
    }
    peaks
}

fn median(values: &mut [u32]) -> Option<u32> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::PulseWave;

    const LIMITS: PeakLimits = PeakLimits {
        min_interval_ms: 300,
        max_interval_ms: 2_000,
    };

    fn window_from(wave: &mut PulseWave) -> Ring<TimedSample, 160> {
        let mut window = Ring::new();
        for i in 0..160u32 {
            let t = i * 20;
            window.push(TimedSample {
                t_ms: t,
                value: wave.value_at(t),
            });
        }
        window
    }

    #[test]
    fn test_partial_window_reports_nothing() {
        let mut window: Ring<TimedSample, 160> = Ring::new();
        window.push(TimedSample {
            t_ms: 0,
            value: 1.0,
        });
        assert_eq!(window_bpm(&window, LIMITS), None);
    }

    #[test]
    fn test_flat_window_reports_nothing() {
        let mut wave = PulseWave::new(800, 100_000.0, 0.0);
        assert_eq!(window_bpm(&window_from(&mut wave), LIMITS), None);
    }

    #[test]
    fn test_sine_rate() {
        for (period, expected) in [(500, 120), (800, 75), (1000, 60), (1500, 40)] {
            let mut wave = PulseWave::new(period, 100_000.0, 3_000.0);
            let bpm = window_bpm(&window_from(&mut wave), LIMITS);
            assert_eq!(bpm, Some(expected), "period {period}");
        }
    }

    #[test]
    fn test_close_maxima_merged() {
        // Secondary hump ~100 ms after each crest, above the floor
        let mut window: Ring<TimedSample, 160> = Ring::new();
        let mut wave = PulseWave::new(1000, 100_000.0, 3_000.0);
        for i in 0..160u32 {
            let t = i * 20;
            let bump = if t % 1000 == 360 { 300.0 } else { 0.0 };
            window.push(TimedSample {
                t_ms: t,
                value: wave.value_at(t) + bump,
            });
        }
        assert_eq!(window_bpm(&window, LIMITS), Some(60));
    }

    #[test]
    fn test_noisy_sine_rate() {
        let mut wave = PulseWave::new(750, 100_000.0, 3_000.0).with_noise(5.0);
        let bpm = window_bpm(&window_from(&mut wave), LIMITS).unwrap();
        assert!(bpm.abs_diff(80) <= 4, "got {bpm}");
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&mut [3, 1, 2]), Some(2));
        assert_eq!(median(&mut [4, 1, 3, 2]), Some(2));
        assert_eq!(median(&mut []), None);
    }
}
