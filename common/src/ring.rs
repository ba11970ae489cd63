//! Fixed-capacity circular buffers.
//!
//! Nothing here allocates: the write index wraps modulo `N` and a buffer
//! reports itself filled once a full lap has been written. [`SampleWindow`]
//! layers min/max/mean statistics on top and only reports them once the
//! window is filled, so consumers never see a half-empty window.

// =============================================================================
// Ring
// =============================================================================

/// Circular buffer of the last `N` values.
#[derive(Clone)]
pub struct Ring<T, const N: usize> {
    buffer: [T; N],
    head: usize,
    count: usize,
}

impl<T: Copy + Default, const N: usize> Ring<T, N> {
    pub fn new() -> Self {
        Self {
            buffer: [T::default(); N],
            head: 0,
            count: 0,
        }
    }

    /// Append a value, overwriting the oldest once full.
    pub fn push(
        &mut self,
        value: T,
    ) {
        self.buffer[self.head] = value;
        self.head = (self.head + 1) % N;
        if self.count < N {
            self.count += 1;
        }
    }

    /// Newest value, if any.
    pub fn latest(&self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        Some(self.buffer[(self.head + N - 1) % N])
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> RingIter<'_, T, N> {
        RingIter {
            ring: self,
            offset: 0,
        }
    }

    /// Forget every value and zero the storage.
    pub fn clear(&mut self) {
        self.buffer = [T::default(); N];
        self.head = 0;
        self.count = 0;
    }

    pub const fn len(&self) -> usize { self.count }

    pub const fn is_empty(&self) -> bool { self.count == 0 }

    /// True once `N` values have been written since the last clear.
    pub const fn is_filled(&self) -> bool { self.count == N }

    pub const fn capacity(&self) -> usize { N }
}

impl<T: Copy + Default, const N: usize> Default for Ring<T, N> {
    fn default() -> Self { Self::new() }
}

/// Oldest-to-newest iterator over a [`Ring`].
pub struct RingIter<'a, T, const N: usize> {
    ring: &'a Ring<T, N>,
    offset: usize,
}

impl<T: Copy + Default, const N: usize> Iterator for RingIter<'_, T, N> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.ring.count {
            return None;
        }
        let start = (self.ring.head + N - self.ring.count) % N;
        let value = self.ring.buffer[(start + self.offset) % N];
        self.offset += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.ring.count - self.offset;
        (remaining, Some(remaining))
    }
}

// =============================================================================
// Sample Window
// =============================================================================

/// Statistics over a filled [`SampleWindow`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl WindowStats {
    #[inline]
    pub fn range(&self) -> f32 { self.max - self.min }
}

/// Ring of `f32` samples with cached window statistics.
///
/// Statistics are rescanned on every push rather than maintained with a
/// running sum, so hours of operation accumulate no rounding drift.
#[derive(Clone)]
pub struct SampleWindow<const N: usize> {
    ring: Ring<f32, N>,
    stats: Option<WindowStats>,
}

impl<const N: usize> SampleWindow<N> {
    pub fn new() -> Self {
        Self {
            ring: Ring::new(),
            stats: None,
        }
    }

    pub fn push(
        &mut self,
        value: f32,
    ) {
        self.ring.push(value);
        if self.ring.is_filled() {
            self.recalculate_stats();
        }
    }

    fn recalculate_stats(&mut self) {
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        let mut sum = 0.0;

        for &val in &self.ring.buffer {
            if val < min {
                min = val;
            }
            if val > max {
                max = val;
            }
            sum += val;
        }

        self.stats = Some(WindowStats {
            min,
            max,
            mean: sum / N as f32,
        });
    }

    /// Window statistics, or `None` until the window has filled.
    pub const fn stats(&self) -> Option<WindowStats> { self.stats }

    pub const fn is_filled(&self) -> bool { self.ring.is_filled() }

    pub const fn len(&self) -> usize { self.ring.len() }

    pub const fn is_empty(&self) -> bool { self.ring.is_empty() }

    pub fn clear(&mut self) {
        self.ring.clear();
        self.stats = None;
    }
}

impl<const N: usize> Default for SampleWindow<N> {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_fills_after_one_lap() {
        let mut ring: Ring<u16, 4> = Ring::new();
        for i in 0..3 {
            ring.push(i);
            assert!(!ring.is_filled());
        }
        ring.push(3);
        assert!(ring.is_filled());
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn test_ring_iterates_oldest_first_after_wrap() {
        let mut ring: Ring<u16, 3> = Ring::new();
        for i in 1..=5 {
            ring.push(i);
        }
        let values: Vec<u16> = ring.iter().collect();
        assert_eq!(values, vec![3, 4, 5]);
        assert_eq!(ring.latest(), Some(5));
    }

    #[test]
    fn test_ring_clear() {
        let mut ring: Ring<u32, 2> = Ring::new();
        ring.push(7);
        ring.push(8);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.latest(), None);
        assert_eq!(ring.iter().count(), 0);
    }

    #[test]
    fn test_window_stats_hidden_until_filled() {
        let mut window: SampleWindow<5> = SampleWindow::new();
        for v in [1.0, 2.0, 3.0, 4.0] {
            window.push(v);
            assert!(window.stats().is_none(), "partial window must not report");
        }
        window.push(5.0);
        let stats = window.stats().unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
        assert!((stats.mean - 3.0).abs() < 1e-6);
        assert!((stats.range() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_window_stats_follow_overwrites() {
        let mut window: SampleWindow<3> = SampleWindow::new();
        for v in [10.0, 20.0, 30.0, 40.0] {
            window.push(v);
        }
        let stats = window.stats().unwrap();
        assert_eq!(stats.min, 20.0, "oldest sample was overwritten");
        assert_eq!(stats.max, 40.0);
    }

    #[test]
    fn test_window_clear_resets_filled_flag() {
        let mut window: SampleWindow<2> = SampleWindow::new();
        window.push(1.0);
        window.push(2.0);
        assert!(window.is_filled());
        window.clear();
        assert!(!window.is_filled());
        assert!(window.stats().is_none());
    }
}
