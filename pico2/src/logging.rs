//! Dual-output logging: every line goes to defmt and into the on-device
//! event log.
//!
//! ```ignore
//! log_info!("Finger placed");
//! log_warn!("Alert: {}", alert.label());
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use vitals_pico2::log_buffer::{LogBuffer, LogEntry, LogLevel};

/// Global event log protected by a mutex.
pub static LOG_BUFFER: Mutex<CriticalSectionRawMutex, LogBuffer> = Mutex::new(LogBuffer::new());

#[inline]
pub fn current_timestamp_ms() -> u32 { embassy_time::Instant::now().as_millis() as u32 }

/// Append to the global log. Non-blocking: if the mutex is held the
/// entry is dropped.
pub fn push_log(
    level: LogLevel,
    message: &str,
) {
    let entry = LogEntry::new(level, message, current_timestamp_ms());
    if let Ok(mut buffer) = LOG_BUFFER.try_lock() {
        buffer.push(entry);
    }
}

/// Replay the retained log over RTT, oldest first.
pub fn dump() {
    let Ok(buffer) = LOG_BUFFER.try_lock() else {
        return;
    };
    defmt::info!("---- event log: {} entries, {} overwritten ----", buffer.len(), buffer.dropped());
    for entry in buffer.iter() {
        defmt::info!(
            "[{=u32:08}] {} {}",
            entry.timestamp_ms,
            entry.level.prefix(),
            entry.message.as_str()
        );
    }
}

/// Log a message at Info level.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let mut buf: heapless::String<{ vitals_pico2::log_buffer::LOG_MSG_LEN }> = heapless::String::new();
        let _ = write!(buf, $($arg)*);
        $crate::logging::push_log(vitals_pico2::log_buffer::LogLevel::Info, buf.as_str());
        defmt::info!($($arg)*);
    }};
}

/// Log a message at Warn level.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let mut buf: heapless::String<{ vitals_pico2::log_buffer::LOG_MSG_LEN }> = heapless::String::new();
        let _ = write!(buf, $($arg)*);
        $crate::logging::push_log(vitals_pico2::log_buffer::LogLevel::Warn, buf.as_str());
        defmt::warn!($($arg)*);
    }};
}

/// Log a message at Error level.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let mut buf: heapless::String<{ vitals_pico2::log_buffer::LOG_MSG_LEN }> = heapless::String::new();
        let _ = write!(buf, $($arg)*);
        $crate::logging::push_log(vitals_pico2::log_buffer::LogLevel::Error, buf.as_str());
        defmt::error!($($arg)*);
    }};
}

/// Log a message at Debug level.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let mut buf: heapless::String<{ vitals_pico2::log_buffer::LOG_MSG_LEN }> = heapless::String::new();
        let _ = write!(buf, $($arg)*);
        $crate::logging::push_log(vitals_pico2::log_buffer::LogLevel::Debug, buf.as_str());
        defmt::debug!($($arg)*);
    }};
}
