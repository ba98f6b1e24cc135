//! Timestamp button: debounce and press/release pairing.
//!
//! [`Debouncer`] is a pure state machine evaluated on every pin transition.
//! [`ButtonMonitor`] wraps it in a critical-section cell so the same state
//! can be driven from an interrupt handler or the EXTI task, and
//! [`run_button`] is the task loop that feeds completed presses into the
//! timestamp channel.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Instant;
use platform::{ButtonInput, Edge};

use crate::channel::{try_send_event, TimestampSender};
use crate::config::{DEBOUNCE_QUIET_MS, PRESS_TIMEOUT_MS};
use crate::diag::Diagnostics;

/// One completed press, in monotonic milliseconds since boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimestampEvent {
    /// When the button went down.
    pub press_ms: u64,
    /// When the button came back up.
    pub release_ms: u64,
}

impl TimestampEvent {
    /// How long the button was held.
    pub const fn held_ms(&self) -> u64 {
        self.release_ms.saturating_sub(self.press_ms)
    }
}

/// Debounce state for one button.
///
/// Transitions:
/// - press, no press open, quiet since last release → press opens
/// - press while a press is open and younger than the timeout → ignored
/// - press while the open press is older than the timeout → stale press is
///   dropped, then evaluated as a fresh press
/// - press within the quiet time after a release → ignored
/// - release with a press open → event, press closes
/// - release with nothing open → ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debouncer {
    open_press: Option<u64>,
    last_release: Option<u64>,
    quiet_ms: u64,
    timeout_ms: u64,
}

impl Debouncer {
    /// Debouncer with the recorder's timings (10 ms quiet, 10 s timeout).
    pub const fn new() -> Self {
        Self::with_timing(DEBOUNCE_QUIET_MS, PRESS_TIMEOUT_MS)
    }

    /// Debouncer with custom timings.
    pub const fn with_timing(quiet_ms: u64, timeout_ms: u64) -> Self {
        Self { open_press: None, last_release: None, quiet_ms, timeout_ms }
    }

    /// Whether a press is currently open.
    pub const fn is_pressed(&self) -> bool {
        self.open_press.is_some()
    }

    /// Evaluate one pin transition observed at `now_ms`.
    pub fn on_edge(&mut self, edge: Edge, now_ms: u64) -> Option<TimestampEvent> {
        match edge {
            Edge::Pressed => {
                self.on_press(now_ms);
                None
            }
            Edge::Released => self.on_release(now_ms),
        }
    }

    fn on_press(&mut self, now_ms: u64) {
        if let Some(press) = self.open_press {
            if now_ms.saturating_sub(press) < self.timeout_ms {
                return;
            }
            // Missed release: forget the stale press.
            self.open_press = None;
        }
        if let Some(release) = self.last_release {
            if now_ms.saturating_sub(release) < self.quiet_ms {
                return;
            }
        }
        self.open_press = Some(now_ms);
    }

    fn on_release(&mut self, now_ms: u64) -> Option<TimestampEvent> {
        let press_ms = self.open_press.take()?;
        self.last_release = Some(now_ms);
        Some(TimestampEvent { press_ms, release_ms: now_ms })
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

/// Debouncer shared between interrupt and task context.
///
/// Every update runs inside a critical section, so a reader never sees a
/// half-written state.
pub struct ButtonMonitor {
    state: Mutex<CriticalSectionRawMutex, Cell<Debouncer>>,
}

impl ButtonMonitor {
    /// Monitor with the recorder's timings; usable in a `static`.
    pub const fn new() -> Self {
        Self::with_debouncer(Debouncer::new())
    }

    /// Monitor wrapping a custom debouncer.
    pub const fn with_debouncer(debouncer: Debouncer) -> Self {
        Self { state: Mutex::new(Cell::new(debouncer)) }
    }

    /// Evaluate one pin transition. Never blocks.
    pub fn on_edge(&self, edge: Edge, now_ms: u64) -> Option<TimestampEvent> {
        self.state.lock(|cell| {
            let mut debouncer = cell.get();
            let event = debouncer.on_edge(edge, now_ms);
            cell.set(debouncer);
            event
        })
    }

    /// Copy of the current debounce state.
    pub fn snapshot(&self) -> Debouncer {
        self.state.lock(Cell::get)
    }
}

impl Default for ButtonMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate one edge and push a completed press without blocking.
///
/// Returns `true` if an event was queued. A full channel drops the event and
/// bumps the drop counter; safe to call from an interrupt handler.
pub fn handle_edge(
    monitor: &ButtonMonitor,
    edge: Edge,
    now_ms: u64,
    tx: &TimestampSender<'_>,
    diag: &Diagnostics,
) -> bool {
    let Some(event) = monitor.on_edge(edge, now_ms) else {
        return false;
    };
    if try_send_event(tx, event) {
        debug!("timestamp {} -> {}", event.press_ms, event.release_ms);
        true
    } else {
        diag.record_dropped_timestamp();
        warn!("timestamp channel full, press at {} ms dropped", event.press_ms);
        false
    }
}

/// Button task body: wait for edges forever, stamping each with the
/// monotonic clock.
pub async fn run_button<B: ButtonInput>(
    input: &mut B,
    monitor: &ButtonMonitor,
    tx: TimestampSender<'_>,
    diag: &Diagnostics,
) -> ! {
    loop {
        let edge = input.wait_for_edge().await;
        let now_ms = Instant::now().as_millis();
        handle_edge(monitor, edge, now_ms, &tx, diag);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::channel::TimestampChannel;

    fn press_release(d: &mut Debouncer, press: u64, release: u64) -> Option<TimestampEvent> {
        assert_eq!(d.on_edge(Edge::Pressed, press), None);
        d.on_edge(Edge::Released, release)
    }

    #[test]
    fn clean_press_produces_event() {
        let mut d = Debouncer::new();
        let ev = press_release(&mut d, 100, 350).unwrap();
        assert_eq!(ev, TimestampEvent { press_ms: 100, release_ms: 350 });
        assert_eq!(ev.held_ms(), 250);
        assert!(!d.is_pressed());
    }

    #[test]
    fn release_without_press_is_ignored() {
        let mut d = Debouncer::new();
        assert_eq!(d.on_edge(Edge::Released, 50), None);
    }

    #[test]
    fn bounce_on_press_keeps_first_edge() {
        let mut d = Debouncer::new();
        d.on_edge(Edge::Pressed, 100);
        d.on_edge(Edge::Pressed, 102);
        d.on_edge(Edge::Pressed, 105);
        let ev = d.on_edge(Edge::Released, 400).unwrap();
        assert_eq!(ev.press_ms, 100);
    }

    #[test]
    fn press_within_quiet_time_after_release_is_ignored() {
        let mut d = Debouncer::new();
        press_release(&mut d, 100, 200).unwrap();
        // Release bounce: pin reads pressed again 5 ms later.
        d.on_edge(Edge::Pressed, 205);
        assert!(!d.is_pressed());
        assert_eq!(d.on_edge(Edge::Released, 207), None);
        // Exactly 10 ms later is accepted.
        d.on_edge(Edge::Pressed, 210);
        assert!(d.is_pressed());
    }

    #[test]
    fn stale_press_is_auto_cleared() {
        let mut d = Debouncer::new();
        d.on_edge(Edge::Pressed, 1_000);
        // Release lost; 10 s later a new press replaces the stale one.
        d.on_edge(Edge::Pressed, 11_000);
        let ev = d.on_edge(Edge::Released, 11_300).unwrap();
        assert_eq!(ev, TimestampEvent { press_ms: 11_000, release_ms: 11_300 });
    }

    #[test]
    fn press_just_before_timeout_is_still_open() {
        let mut d = Debouncer::new();
        d.on_edge(Edge::Pressed, 1_000);
        d.on_edge(Edge::Pressed, 10_999);
        let ev = d.on_edge(Edge::Released, 11_000).unwrap();
        assert_eq!(ev.press_ms, 1_000);
    }

    #[test]
    fn monitor_shares_state_across_calls() {
        let monitor = ButtonMonitor::new();
        assert_eq!(monitor.on_edge(Edge::Pressed, 10), None);
        assert!(monitor.snapshot().is_pressed());
        assert_eq!(
            monitor.on_edge(Edge::Released, 60),
            Some(TimestampEvent { press_ms: 10, release_ms: 60 })
        );
    }

    #[test]
    fn full_channel_drops_and_counts() {
        let channel = TimestampChannel::new();
        let tx = channel.sender();
        let monitor = ButtonMonitor::new();
        let diag = Diagnostics::new();

        let mut t = 0u64;
        let mut queued = 0;
        for _ in 0..10 {
            handle_edge(&monitor, Edge::Pressed, t, &tx, &diag);
            if handle_edge(&monitor, Edge::Released, t + 50, &tx, &diag) {
                queued += 1;
            }
            t += 100;
        }
        assert_eq!(queued, 8);
        assert_eq!(diag.snapshot().dropped_timestamps, 2);
        assert_eq!(channel.len(), 8);
    }
}
