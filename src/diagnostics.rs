//! Runtime diagnostics.
//!
//! A panic hook that logs the reason and location before the default
//! handler aborts, and a heap snapshot the supervisor logs together with
//! the task health report.

/// Heap usage collected on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapSnapshot {
    pub free: u32,
    pub min_free: u32,
}

impl HeapSnapshot {
    #[cfg(target_os = "espidf")]
    pub fn collect() -> Self {
        // SAFETY: plain reads of allocator statistics.
        let free = unsafe { esp_idf_svc::sys::esp_get_free_heap_size() };
        let min_free = unsafe { esp_idf_svc::sys::esp_get_minimum_free_heap_size() };
        Self { free, min_free }
    }

    /// Simulation: a fixed 300 KB heap.
    #[cfg(not(target_os = "espidf"))]
    pub fn collect() -> Self {
        Self { free: 307_200, min_free: 307_200 }
    }
}

impl core::fmt::Display for HeapSnapshot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "heap free={} min={}", self.free, self.min_free)
    }
}

// ───────────────────────────────────────────────────────────────
// Custom panic handler
// ───────────────────────────────────────────────────────────────

/// Text of a panic payload.
pub fn panic_reason(payload: &(dyn core::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Install a panic hook that logs the reason, location and heap state,
/// then chains to the previous hook.
pub fn install_panic_handler() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let reason = panic_reason(info.payload());
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        log::error!("PANIC at {}: {} ({})", location, reason, HeapSnapshot::collect());
        previous(info);
    }));
}
