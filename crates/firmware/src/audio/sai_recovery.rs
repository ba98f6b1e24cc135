//! SAI overrun recovery.
//!
//! # Background: embassy issue #3205
//!
//! Once the SAI ring buffer overruns, every later `read()` (or `write()` on a
//! transmitter) fails immediately with an overrun error. The driver has no
//! reset; the ring and its DMA state stay stuck until the driver is dropped
//! and rebuilt.
//!
//! For capture an overrun means the capture task fell a full ring behind
//! the codec. Those samples are gone either way; the recovery restores the
//! stream so the current session continues with a gap instead of ending.
//!
//! # This module
//!
//! [`SaiRecoveryState`] tracks whether the driver must be rebuilt. It holds no
//! embassy-stm32 types so it runs in host tests; the drop + rebuild lives in
//! [`super::sai`].
//!
//! ```rust,ignore
//! let mut recovery = SaiRecoveryState::new();
//!
//! loop {
//!     if recovery.needs_recovery() {
//!         drop(sai);
//!         sai = build();
//!         recovery.on_recovered();
//!     }
//!     let result = sai.read(&mut words).await.map_err(SaiTransferError::from);
//!     recovery.on_transfer_result(result);
//! }
//! ```

use platform::CaptureFault;

/// SAI transfer error variants relevant to recovery.
///
/// Maps from `embassy_stm32::sai::Error` on hardware builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SaiTransferError {
    /// Ring buffer overrun: the driver is stuck until rebuilt.
    Overrun,
    /// Any other driver error (wrong direction, DMA misconfiguration).
    Other,
}

impl From<SaiTransferError> for CaptureFault {
    fn from(e: SaiTransferError) -> Self {
        match e {
            SaiTransferError::Overrun => Self::Overrun,
            SaiTransferError::Other => Self::Dma,
        }
    }
}

/// SAI driver recovery state machine.
///
/// `overrun_count` saturates at [`u8::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SaiRecoveryState {
    /// Transfers succeed.
    Healthy,
    /// One or more overruns since the last rebuild.
    NeedsRecovery {
        /// Overruns since the last rebuild.
        overrun_count: u8,
    },
}

impl SaiRecoveryState {
    /// Start healthy.
    pub const fn new() -> Self {
        Self::Healthy
    }

    /// The driver must be dropped and rebuilt before the next transfer.
    pub const fn needs_recovery(&self) -> bool {
        matches!(self, Self::NeedsRecovery { .. })
    }

    /// Update after every transfer attempt. Only overruns change state.
    pub fn on_transfer_result(&mut self, result: Result<(), SaiTransferError>) {
        if let Err(SaiTransferError::Overrun) = result {
            *self = Self::NeedsRecovery {
                overrun_count: match self {
                    Self::NeedsRecovery { overrun_count } => overrun_count.saturating_add(1),
                    Self::Healthy => 1,
                },
            };
        }
    }

    /// Call once the driver has been rebuilt.
    pub fn on_recovered(&mut self) {
        *self = Self::Healthy;
    }

    /// Overruns since the last rebuild, 0 when healthy.
    pub const fn overrun_count(&self) -> u8 {
        match self {
            Self::NeedsRecovery { overrun_count } => *overrun_count,
            Self::Healthy => 0,
        }
    }
}

impl Default for SaiRecoveryState {
    fn default() -> Self {
        Self::new()
    }
}
