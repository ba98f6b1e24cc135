//! Capture DMA geometry and the memory DMA1 can reach on STM32H743ZI.
//!
//! | Region        | Base          | Size   | DMA1 | Recorder use            |
//! |---------------|---------------|--------|------|-------------------------|
//! | DTCM          | `0x2000_0000` | 128 KB | no   | stack, `.bss`, buffers  |
//! | AXI SRAM (D1) | `0x2400_0000` | 512 KB | yes  | SAI capture/monitor rings |
//! | SRAM1-3 (D2)  | `0x3000_0000` | 288 KB | yes  | unused                  |
//!
//! The accumulation buffers are only touched by the CPU and stay in DTCM.
//! Anything a DMA stream reads or writes must sit in a region where
//! [`dma1_reachable`] holds.

// ── Memory regions ───────────────────────────────────────────────────────────

/// Base address of DTCM (CPU only).
pub const DTCM_BASE: u32 = 0x2000_0000;

/// Size of DTCM in bytes.
pub const DTCM_SIZE_BYTES: usize = 128 * 1024;

/// Base address of AXI SRAM.
pub const AXI_SRAM_BASE: u32 = 0x2400_0000;

/// Size of AXI SRAM in bytes.
pub const AXI_SRAM_SIZE_BYTES: usize = 512 * 1024;

/// Base address of the D2 SRAM banks.
pub const D2_SRAM_BASE: u32 = 0x3000_0000;

/// Combined size of SRAM1, SRAM2 and SRAM3.
pub const D2_SRAM_SIZE_BYTES: usize = 288 * 1024;

#[allow(clippy::cast_possible_truncation)] // sizes are far below 4 GiB
const fn within(addr: u32, base: u32, size: usize) -> bool {
    addr >= base && addr.wrapping_sub(base) < size as u32
}

/// Whether DMA1 can address `addr`.
///
/// ```
/// use platform::dma_safety::{dma1_reachable, AXI_SRAM_BASE, DTCM_BASE};
/// assert!(dma1_reachable(AXI_SRAM_BASE));
/// assert!(!dma1_reachable(DTCM_BASE));
/// ```
pub const fn dma1_reachable(addr: u32) -> bool {
    within(addr, AXI_SRAM_BASE, AXI_SRAM_SIZE_BYTES) || within(addr, D2_SRAM_BASE, D2_SRAM_SIZE_BYTES)
}

// ── Capture geometry ─────────────────────────────────────────────────────────

/// Stereo frames per capture block (one SAI half-transfer).
///
/// At 44.1 kHz, 1024 frames = ~23.2 ms per block.
pub const CAPTURE_DMA_BLOCK_FRAMES: usize = 1024;

/// Capture block size in bytes: 1024 frames of 16-bit stereo, the largest
/// block the recorder accepts.
pub const CAPTURE_DMA_BLOCK_BYTES: usize = CAPTURE_DMA_BLOCK_FRAMES * 2 * 2;

/// Blocks held in the SAI receive ring before it overruns.
pub const CAPTURE_DMA_RING_BLOCKS: usize = 4;

/// 16-bit words in the SAI receive ring.
pub const CAPTURE_DMA_RING_WORDS: usize = CAPTURE_DMA_RING_BLOCKS * CAPTURE_DMA_BLOCK_BYTES / 2;

/// 16-bit words in the SAI transmit ring used for monitoring.
pub const MONITOR_DMA_RING_WORDS: usize = 2 * CAPTURE_DMA_BLOCK_BYTES / 2;

const _: () = assert!((CAPTURE_DMA_RING_WORDS + MONITOR_DMA_RING_WORDS) * 2 <= AXI_SRAM_SIZE_BYTES);
