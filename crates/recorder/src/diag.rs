//! Pipeline health counters.
//!
//! Every place that drops data or hits a fault bumps one of these. They are
//! plain relaxed atomics, readable from any task or interrupt, and never
//! reset while running.

use core::sync::atomic::{AtomicU32, Ordering};

/// Shared event counters; place in a `static`.
#[derive(Debug, Default)]
pub struct Diagnostics {
    dropped_timestamps: AtomicU32,
    dropped_flushes: AtomicU32,
    capture_overruns: AtomicU32,
    capture_dma_errors: AtomicU32,
    monitor_timeouts: AtomicU32,
    medium_unavailable: AtomicU32,
    storage_failures: AtomicU32,
    sessions_opened: AtomicU32,
}

/// Point-in-time copy of [`Diagnostics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiagnosticsSnapshot {
    /// Presses lost to a full timestamp channel.
    pub dropped_timestamps: u32,
    /// Accumulated buffers discarded because the request channel was full.
    pub dropped_flushes: u32,
    /// SAI overruns reported by the capture source.
    pub capture_overruns: u32,
    /// Other DMA faults reported by the capture source.
    pub capture_dma_errors: u32,
    /// Monitor writes that missed their deadline.
    pub monitor_timeouts: u32,
    /// Requests handled while no medium could be mounted.
    pub medium_unavailable: u32,
    /// Write or close failures that ended a session.
    pub storage_failures: u32,
    /// Sessions started since boot.
    pub sessions_opened: u32,
}

fn bump(counter: &AtomicU32) {
    // Wrapping is fine for event counters.
    counter.fetch_add(1, Ordering::Relaxed);
}

impl Diagnostics {
    /// All counters at zero.
    pub const fn new() -> Self {
        Self {
            dropped_timestamps: AtomicU32::new(0),
            dropped_flushes: AtomicU32::new(0),
            capture_overruns: AtomicU32::new(0),
            capture_dma_errors: AtomicU32::new(0),
            monitor_timeouts: AtomicU32::new(0),
            medium_unavailable: AtomicU32::new(0),
            storage_failures: AtomicU32::new(0),
            sessions_opened: AtomicU32::new(0),
        }
    }

    pub(crate) fn record_dropped_timestamp(&self) {
        bump(&self.dropped_timestamps);
    }

    pub(crate) fn record_dropped_flush(&self) {
        bump(&self.dropped_flushes);
    }

    pub(crate) fn record_capture_fault(&self, fault: platform::CaptureFault) {
        match fault {
            platform::CaptureFault::Overrun => bump(&self.capture_overruns),
            platform::CaptureFault::Dma => bump(&self.capture_dma_errors),
        }
    }

    pub(crate) fn record_monitor_timeout(&self) {
        bump(&self.monitor_timeouts);
    }

    pub(crate) fn record_medium_unavailable(&self) {
        bump(&self.medium_unavailable);
    }

    pub(crate) fn record_storage_failure(&self) {
        bump(&self.storage_failures);
    }

    pub(crate) fn record_session_opened(&self) {
        bump(&self.sessions_opened);
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let load = |c: &AtomicU32| c.load(Ordering::Relaxed);
        DiagnosticsSnapshot {
            dropped_timestamps: load(&self.dropped_timestamps),
            dropped_flushes: load(&self.dropped_flushes),
            capture_overruns: load(&self.capture_overruns),
            capture_dma_errors: load(&self.capture_dma_errors),
            monitor_timeouts: load(&self.monitor_timeouts),
            medium_unavailable: load(&self.medium_unavailable),
            storage_failures: load(&self.storage_failures),
            sessions_opened: load(&self.sessions_opened),
        }
    }
}
