//! Cortex-M exception handlers.
//!
//! - **HardFault**: bus faults, illegal instructions, and stack overflow
//!   into the bottom of DTCM. The handler logs the stacked frame and halts;
//!   the watchdog then resets the recorder, and the next session starts on
//!   a fresh counter value so the interrupted file is left as written.
//!
//! The `#[cortex_m_rt::exception]` attribute needs ARM intrinsics, so the
//! handler is gated behind `feature = "hardware"`. The module itself (and
//! `HARDFAULT_DEFINED`) compiles unconditionally for host tests.

#![allow(clippy::doc_markdown)] // HardFault, DTCM are hardware names
/// Marker constant, checked by the layout tests.
pub const HARDFAULT_DEFINED: bool = true;

/// HardFault exception handler (hardware target only).
///
/// Must never return: returning from a HardFault is undefined behavior on
/// Cortex-M.
#[cfg(feature = "hardware")]
#[cortex_m_rt::exception]
#[allow(unsafe_code)]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    defmt::error!(
        "HardFault: pc=0x{:08X} lr=0x{:08X} xpsr=0x{:08X}",
        ef.pc(),
        ef.lr(),
        ef.xpsr()
    );
    // The IWDG resets the core.
    loop {
        cortex_m::asm::wfi();
    }
}
