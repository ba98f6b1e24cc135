//! DMA buffer placement for the SAI rings.
//!
//! The Cortex-M7 cacheline is 32 bytes. D-cache stays disabled in this
//! firmware, but the rings are still aligned to a full line and kept in
//! AXI SRAM (`.axisram`), the only large region DMA1 can reach. DTCM, where
//! `.bss` lives, is invisible to every DMA controller.
//!
//! `.axisram` is a NOLOAD section: its contents are undefined at reset, so
//! every ring goes through [`zeroed_ring`] exactly once before use.

use platform::dma_safety::{CAPTURE_DMA_RING_WORDS, MONITOR_DMA_RING_WORDS};

/// A `#[repr(align(32))]` wrapper for DMA-accessible buffers.
#[derive(Clone, Copy)]
#[repr(align(32))]
pub struct Align32<T>(
    /// The inner value. Public so statics can be initialized in place.
    pub T,
);

/// SAI receive ring: 16-bit words, several capture blocks deep.
pub type CaptureRing = Align32<[u16; CAPTURE_DMA_RING_WORDS]>;

/// SAI transmit ring for the monitor output.
pub type MonitorRing = Align32<[u16; MONITOR_DMA_RING_WORDS]>;

/// Zero a ring in place and hand out its words.
///
/// # Safety
///
/// `ring` must point to a live static that no other reference aliases for
/// the returned lifetime; in practice, called once per ring at boot and
/// again only after the driver that held the previous borrow was dropped.
#[allow(unsafe_code)]
pub unsafe fn zeroed_ring<const N: usize>(ring: *mut Align32<[u16; N]>) -> &'static mut [u16; N] {
    // SAFETY: caller guarantees exclusive access; u16 has no invalid bit
    // patterns, so a zero fill makes the memory fully initialized.
    unsafe {
        core::ptr::write_bytes(ring, 0, 1);
        &mut (*ring).0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn rings_are_cacheline_aligned() {
        assert_eq!(core::mem::align_of::<CaptureRing>(), 32);
        assert_eq!(core::mem::align_of::<MonitorRing>(), 32);
        assert_eq!(core::mem::size_of::<CaptureRing>() % 32, 0);
    }

    #[test]
    #[allow(unsafe_code)]
    fn zeroed_ring_clears_stale_contents() {
        let ring: &'static mut Align32<[u16; 64]> = Box::leak(Box::new(Align32([0xDEAD; 64])));
        // SAFETY: freshly leaked, nothing else references it.
        let words = unsafe { zeroed_ring(ring) };
        assert!(words.iter().all(|w| *w == 0));
    }
}
