//! Audio path: SAI capture and monitor drivers.
//!
//! - `pcm`: SAI word ↔ little-endian byte conversion (host-testable)
//! - `sai_recovery`: overrun recovery state machine (host-testable)
//! - `sai`: embassy-stm32 drivers implementing [`platform::AudioSource`]
//!   and [`platform::MonitorSink`] (`hardware` only)

pub mod pcm;
#[cfg(feature = "hardware")]
pub mod sai;
pub mod sai_recovery;

#[cfg(feature = "hardware")]
pub use sai::{SaiCapture, SaiMonitor};
pub use sai_recovery::{SaiRecoveryState, SaiTransferError};
