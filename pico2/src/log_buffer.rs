//! Bounded on-device event log.
//!
//! Keeps the most recent log lines with their level and timestamp so they
//! can be dumped over RTT on demand, long after the defmt stream has
//! scrolled past. The global instance and the `log_*!` macros that feed it
//! live in the firmware binary.

use heapless::String;

/// Maximum number of log entries to keep.
pub const LOG_ENTRIES: usize = 32;

/// Maximum characters per log message.
pub const LOG_MSG_LEN: usize = 48;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[repr(u8)]
pub enum LogLevel {
    Debug = 1,
    #[default]
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    /// Single-character prefix used when dumping.
    pub const fn prefix(self) -> char {
        match self {
            Self::Debug => 'D',
            Self::Info => 'I',
            Self::Warn => 'W',
            Self::Error => 'E',
        }
    }
}

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub level: LogLevel,
    /// Truncated to [`LOG_MSG_LEN`] characters.
    pub message: String<LOG_MSG_LEN>,
    /// Milliseconds since boot.
    pub timestamp_ms: u32,
}

impl LogEntry {
    pub fn new(
        level: LogLevel,
        message: &str,
        timestamp_ms: u32,
    ) -> Self {
        let mut truncated: String<LOG_MSG_LEN> = String::new();
        for c in message.chars() {
            if truncated.push(c).is_err() {
                break;
            }
        }
        Self {
            level,
            message: truncated,
            timestamp_ms,
        }
    }
}

/// Circular buffer of log entries; the oldest entry is overwritten.
pub struct LogBuffer {
    entries: [LogEntry; LOG_ENTRIES],
    head: usize,
    count: usize,
    /// Entries overwritten since boot.
    dropped: u32,
}

impl LogBuffer {
    pub const fn new() -> Self {
        Self {
            entries: [const {
                LogEntry {
                    level: LogLevel::Info,
                    message: String::new(),
                    timestamp_ms: 0,
                }
            }; LOG_ENTRIES],
            head: 0,
            count: 0,
            dropped: 0,
        }
    }

    pub fn push(
        &mut self,
        entry: LogEntry,
    ) {
        self.entries[self.head] = entry;
        self.head = (self.head + 1) % LOG_ENTRIES;
        if self.count < LOG_ENTRIES {
            self.count += 1;
        } else {
            self.dropped = self.dropped.saturating_add(1);
        }
    }

    #[inline]
    pub const fn len(&self) -> usize { self.count }

    #[inline]
    pub const fn is_empty(&self) -> bool { self.count == 0 }

    pub const fn dropped(&self) -> u32 { self.dropped }

    pub fn clear(&mut self) {
        self.head = 0;
        self.count = 0;
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> + '_ {
        let start = if self.count < LOG_ENTRIES { 0 } else { self.head };
        (0..self.count).map(move |i| &self.entries[(start + i) % LOG_ENTRIES])
    }
}

impl Default for LogBuffer {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(
        message: &str,
        at: u32,
    ) -> LogEntry {
        LogEntry::new(LogLevel::Info, message, at)
    }

    #[test]
    fn test_message_truncated() {
        let long = "x".repeat(LOG_MSG_LEN + 20);
        assert_eq!(info(&long, 0).message.len(), LOG_MSG_LEN);
        assert_eq!(info("finger placed", 0).message.as_str(), "finger placed");
    }

    #[test]
    fn test_iterates_oldest_first() {
        let mut log = LogBuffer::new();
        log.push(info("a", 1));
        log.push(info("b", 2));
        let stamps: Vec<u32> = log.iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(stamps, [1, 2]);
    }

    #[test]
    fn test_overwrites_oldest_when_full() {
        let mut log = LogBuffer::new();
        for t in 0..(LOG_ENTRIES as u32 + 3) {
            log.push(info("tick", t));
        }
        assert_eq!(log.len(), LOG_ENTRIES);
        assert_eq!(log.dropped(), 3);
        assert_eq!(log.iter().next().map(|e| e.timestamp_ms), Some(3));
        assert_eq!(log.iter().last().map(|e| e.timestamp_ms), Some(LOG_ENTRIES as u32 + 2));
    }

    #[test]
    fn test_clear() {
        let mut log = LogBuffer::new();
        log.push(LogEntry::new(LogLevel::Warn, "probe lost", 5));
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.iter().count(), 0);
    }

    #[test]
    fn test_level_prefix() {
        assert_eq!(LogLevel::Warn.prefix(), 'W');
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }
}
