//! RAM-backed settings store.
//!
//! Holds at most `N` float settings under short string keys. Firmware uses
//! it as the working copy of the persisted calibration; the simulator and
//! tests use it directly.

use heapless::{String, Vec};

use crate::ports::{SettingsError, SettingsStore};

/// Longest key the store accepts.
pub const MAX_KEY_LEN: usize = 16;

pub struct MemorySettings<const N: usize> {
    entries: Vec<(String<MAX_KEY_LEN>, f32), N>,
}

impl<const N: usize> MemorySettings<N> {
    pub const fn new() -> Self { Self { entries: Vec::new() } }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Drop a key. Returns true if it was present.
    pub fn remove(
        &mut self,
        key: &str,
    ) -> bool {
        match self.entries.iter().position(|(k, _)| k.as_str() == key) {
            Some(index) => {
                self.entries.swap_remove(index);
                true
            }
            None => false,
        }
    }
}

impl<const N: usize> Default for MemorySettings<N> {
    fn default() -> Self { Self::new() }
}

impl<const N: usize> SettingsStore for MemorySettings<N> {
    fn get_float(
        &self,
        key: &str,
        default: f32,
    ) -> f32 {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map_or(default, |&(_, value)| value)
    }

    fn put_float(
        &mut self,
        key: &str,
        value: f32,
    ) -> Result<(), SettingsError> {
        if let Some((_, slot)) = self.entries.iter_mut().find(|(k, _)| k.as_str() == key) {
            *slot = value;
            return Ok(());
        }

        let mut owned: String<MAX_KEY_LEN> = String::new();
        owned.push_str(key).map_err(|_| SettingsError::KeyTooLong)?;
        self.entries.push((owned, value)).map_err(|_| SettingsError::Full)
    }
}
