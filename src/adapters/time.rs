//! ESP32 time adapters.
//!
//! [`SystemClock`] implements [`ClockPort`]:
//!
//! - **`target_os = "espidf"`**: uptime from `esp_timer_get_time()` (the
//!   ESP-IDF high-resolution timer, monotonic).
//! - **`not(target_os = "espidf")`**: uptime from `std::time::Instant`.
//!
//! Wall-clock time comes from `SystemTime` on both; ESP-IDF backs it with
//! `gettimeofday`, which SNTP sets.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::app::ports::ClockPort;

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

impl ClockPort for SystemClock {
    /// Seconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    fn uptime_secs(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000_000
    }

    /// Seconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    fn unix_time(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64)
    }
}
