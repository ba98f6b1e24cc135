//! Field Recorder Firmware
//!
//! Continuous PCM capture to WAV on an SD card, with a button that stamps
//! press/release offsets into a companion text file. STM32H743ZI target.
//!
//! # Architecture
//!
//! ```text
//! main.rs (wiring, heartbeat)
//!         ↓
//! tasks: capture (high priority) | storage owner | button
//!         ↓
//! recorder crate (pipeline, WAV codec, sessions)
//!         ↓
//! platform crate (Storage / AudioSource / ButtonInput traits)
//!         ↓
//! drivers here: SAI, EXTI, SD card over SPI, internal flash
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for STM32H7 target (embassy, embedded HAL)
//! - `std` - Host builds of the driver-independent parts (tests)
//!
//! ```bash
//! cargo build --release --target thumbv7em-none-eabihf --features hardware
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Critical correctness: deny these
#![deny(clippy::await_holding_lock)] // holding a blocking Mutex across .await is a bug
#![deny(unsafe_op_in_unsafe_fn)]
// unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
#![warn(clippy::dbg_macro)]
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(async_fn_in_trait)]

pub mod audio;
pub mod boot;
pub mod dma;
pub mod exception_handlers;
pub mod input;
pub mod storage;

#[cfg(feature = "hardware")]
pub mod tasks;

/// Log a fatal setup error and halt until the watchdog resets the core.
///
/// Used for wiring failures in `main` that leave nothing to record with.
#[cfg(feature = "hardware")]
pub fn fatal(what: &str) -> ! {
    defmt::error!("fatal: {=str}", what);
    loop {
        cortex_m::asm::wfi();
    }
}
