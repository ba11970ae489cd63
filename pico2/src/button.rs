//! Operator button debounce.
//!
//! Time-based edge detection: a level change is accepted only if the
//! previous accepted change is at least [`DEBOUNCE_MS`] old, so contact
//! bounce cannot produce repeated presses. Time is the same `u32`
//! millisecond clock the monitor runs on.

/// Debounce duration in milliseconds.
pub const DEBOUNCE_MS: u32 = 50;

pub struct ButtonState {
    was_pressed: bool,
    last_change_ms: Option<u32>,
}

impl ButtonState {
    pub const fn new() -> Self {
        Self {
            was_pressed: false,
            last_change_ms: None,
        }
    }

    /// True once per press. Buttons are active-low, so `is_low` means
    /// pressed.
    pub fn just_pressed(
        &mut self,
        is_low: bool,
        now_ms: u32,
    ) -> bool {
        if is_low == self.was_pressed {
            return false;
        }
        if let Some(last) = self.last_change_ms
            && now_ms.wrapping_sub(last) < DEBOUNCE_MS
        {
            return false;
        }

        self.was_pressed = is_low;
        self.last_change_ms = Some(now_ms);
        is_low
    }
}

impl Default for ButtonState {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_fires_once() {
        let mut button = ButtonState::new();
        assert!(button.just_pressed(true, 0));
        assert!(!button.just_pressed(true, 10));
        assert!(!button.just_pressed(true, 500), "held, not pressed again");
    }

    #[test]
    fn test_bounce_is_ignored() {
        let mut button = ButtonState::new();
        assert!(button.just_pressed(true, 1_000));
        assert!(!button.just_pressed(false, 1_005), "release bounce");
        assert!(!button.just_pressed(true, 1_010));
        assert!(!button.just_pressed(false, 1_060), "release accepted");
        assert!(button.just_pressed(true, 1_200), "second press");
    }

    #[test]
    fn test_release_never_fires() {
        let mut button = ButtonState::new();
        button.just_pressed(true, 0);
        assert!(!button.just_pressed(false, 100));
    }

    #[test]
    fn test_clock_wrap() {
        let mut button = ButtonState::new();
        assert!(button.just_pressed(true, u32::MAX - 10));
        assert!(!button.just_pressed(false, 20), "31 ms after the press");
        assert!(!button.just_pressed(false, 60), "accepted at 71 ms");
        assert!(button.just_pressed(true, 200));
    }
}
