//! SAI capture source and monitor sink.
//!
//! # Wiring (STM32H743ZI LQFP-144)
//!
//! | Block    | Role                 | SCK  | SD   | FS   | DMA      |
//! |----------|----------------------|------|------|------|----------|
//! | SAI1 A   | capture (receiver)   | PE5  | PE6  | PE4  | DMA1_CH0 |
//! | SAI2 A   | monitor (transmitter)| PD13 | PD11 | PD12 | DMA1_CH1 |
//!
//! Both blocks are slaves: the codec drives bit clock and frame sync on a
//! shared bus, 16-bit stereo at 44.1 kHz.
//!
//! # Rebuild after overrun
//!
//! Each driver is owned as an `Option` next to a `fn()` that builds it from
//! stolen peripherals. After an overrun the old driver is dropped first,
//! releasing its ring, then rebuilt (see [`super::sai_recovery`]).

use core::ptr::addr_of_mut;

use embassy_stm32::peripherals::{DMA1_CH0, DMA1_CH1, PD11, PD12, PD13, PE4, PE5, PE6, SAI1, SAI2};
use embassy_stm32::sai::{self, Sai};
use embassy_time::{with_timeout, Duration};

use platform::dma_safety::{dma1_reachable, CAPTURE_DMA_BLOCK_BYTES, CAPTURE_DMA_RING_WORDS, MONITOR_DMA_RING_WORDS};
use platform::{AudioSource, CaptureFault, MonitorError, MonitorSink};

use super::pcm::{bytes_to_words, words_to_bytes};
use super::sai_recovery::{SaiRecoveryState, SaiTransferError};
use crate::dma::{zeroed_ring, Align32, CaptureRing, MonitorRing};

/// Capture driver type.
pub type CaptureSai = Sai<'static, SAI1, u16>;
/// Monitor driver type.
pub type MonitorSai = Sai<'static, SAI2, u16>;

const BLOCK_WORDS: usize = CAPTURE_DMA_BLOCK_BYTES / 2;

#[link_section = ".axisram"]
static mut CAPTURE_RING: CaptureRing = Align32([0; CAPTURE_DMA_RING_WORDS]);

#[link_section = ".axisram"]
static mut MONITOR_RING: MonitorRing = Align32([0; MONITOR_DMA_RING_WORDS]);

impl From<sai::Error> for SaiTransferError {
    fn from(e: sai::Error) -> Self {
        match e {
            sai::Error::Overrun => Self::Overrun,
            _ => Self::Other,
        }
    }
}

/// Halt if the linker put a ring where DMA1 cannot reach it.
fn check_placement(ring: &[u16], label: &'static str) {
    #[allow(clippy::cast_possible_truncation)] // 32-bit address space
    let addr = ring.as_ptr() as usize as u32;
    if !dma1_reachable(addr) {
        defmt::error!("{=str} ring at 0x{:08X} is outside DMA1 reach", label, addr);
        crate::fatal("SAI ring misplaced");
    }
}

fn slave_config(tx_rx: sai::TxRx) -> sai::Config {
    let mut config = sai::Config::default();
    config.mode = sai::Mode::Slave;
    config.tx_rx = tx_rx;
    config.data_size = sai::DataSize::Data16;
    config.stereo_mono = sai::StereoMono::Stereo;
    config
}

/// Build the capture driver on SAI1 block A.
pub fn build_capture() -> CaptureSai {
    // SAFETY: SAI1, PE4-PE6 and DMA1_CH0 are never used through the
    // `Peripherals` returned by `embassy_stm32::init`. This function is their
    // only user, and SaiCapture calls it again only after dropping the
    // previous driver.
    #[allow(unsafe_code)]
    let (peri, sck, sd, fs, dma) =
        unsafe { (SAI1::steal(), PE5::steal(), PE6::steal(), PE4::steal(), DMA1_CH0::steal()) };
    let (block_a, _) = sai::split_subblocks(peri);
    // SAFETY: same exclusivity argument; the ring's previous borrower is gone.
    #[allow(unsafe_code)]
    let ring = unsafe { zeroed_ring(addr_of_mut!(CAPTURE_RING)) };
    check_placement(ring.as_slice(), "capture");
    Sai::new_asynchronous(block_a, sck, sd, fs, dma, ring, slave_config(sai::TxRx::Receiver))
}

/// Build the monitor driver on SAI2 block A.
pub fn build_monitor() -> MonitorSai {
    // SAFETY: as for `build_capture`, with SAI2, PD11-PD13 and DMA1_CH1.
    #[allow(unsafe_code)]
    let (peri, sck, sd, fs, dma) =
        unsafe { (SAI2::steal(), PD13::steal(), PD11::steal(), PD12::steal(), DMA1_CH1::steal()) };
    let (block_a, _) = sai::split_subblocks(peri);
    // SAFETY: see above.
    #[allow(unsafe_code)]
    let ring = unsafe { zeroed_ring(addr_of_mut!(MONITOR_RING)) };
    check_placement(ring.as_slice(), "monitor");
    Sai::new_asynchronous(block_a, sck, sd, fs, dma, ring, slave_config(sai::TxRx::Transmitter))
}

/// Take the live driver, rebuilding it first if an overrun left it stuck.
fn ensure<'a, T: sai::Instance>(
    slot: &'a mut Option<Sai<'static, T, u16>>,
    build: fn() -> Sai<'static, T, u16>,
    recovery: &mut SaiRecoveryState,
    label: &'static str,
) -> &'a mut Sai<'static, T, u16> {
    if recovery.needs_recovery() {
        defmt::warn!("{=str}: rebuilding SAI after {=u8} overruns", label, recovery.overrun_count());
        // Drop before rebuilding: the new driver takes the same ring and stream.
        *slot = None;
        recovery.on_recovered();
    }
    slot.get_or_insert_with(|| {
        let mut driver = build();
        driver.start();
        driver
    })
}

/// [`AudioSource`] over the capture SAI.
pub struct SaiCapture {
    sai: Option<CaptureSai>,
    build: fn() -> CaptureSai,
    recovery: SaiRecoveryState,
    words: [u16; BLOCK_WORDS],
}

impl SaiCapture {
    /// Driver is built lazily on the first read.
    pub fn new(build: fn() -> CaptureSai) -> Self {
        Self { sai: None, build, recovery: SaiRecoveryState::new(), words: [0; BLOCK_WORDS] }
    }
}

impl AudioSource for SaiCapture {
    async fn read_block(&mut self, block: &mut [u8]) -> Result<usize, CaptureFault> {
        let count = (block.len() / 2).min(BLOCK_WORDS);
        let sai = ensure(&mut self.sai, self.build, &mut self.recovery, "capture");
        let words = self.words.get_mut(..count).ok_or(CaptureFault::Dma)?;
        let result = sai.read(words).await.map_err(SaiTransferError::from);
        self.recovery.on_transfer_result(result);
        result?;
        Ok(words_to_bytes(words, block))
    }
}

/// [`MonitorSink`] over the monitor SAI.
pub struct SaiMonitor {
    sai: Option<MonitorSai>,
    build: fn() -> MonitorSai,
    recovery: SaiRecoveryState,
    words: [u16; BLOCK_WORDS],
}

impl SaiMonitor {
    /// Driver is built lazily on the first write.
    pub fn new(build: fn() -> MonitorSai) -> Self {
        Self { sai: None, build, recovery: SaiRecoveryState::new(), words: [0; BLOCK_WORDS] }
    }
}

impl MonitorSink for SaiMonitor {
    async fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize, MonitorError> {
        let count = bytes_to_words(bytes, &mut self.words);
        let sai = ensure(&mut self.sai, self.build, &mut self.recovery, "monitor");
        let words = self.words.get(..count).ok_or(MonitorError::Device)?;
        let result = match with_timeout(timeout, sai.write(words)).await {
            Ok(result) => result.map_err(SaiTransferError::from),
            Err(_) => return Err(MonitorError::Timeout),
        };
        self.recovery.on_transfer_result(result);
        result.map_err(|_| MonitorError::Device)?;
        Ok(count.saturating_mul(2))
    }
}
