//! Recording pipeline - button timestamps and PCM capture to WAV on removable media
//!
//! ```text
//! button EXTI ──▶ ButtonMonitor ──▶ TimestampChannel ─┐
//!                                                     ├─▶ StorageOwner ──▶ wav codec ──▶ Storage
//! SAI DMA ──▶ CaptureLoop ──▶ Accumulator ──▶ RequestChannel ─┘      │
//!                 ▲                                                  │
//!                 └────────────── FreeBufferChannel ◀────────────────┘
//! ```
//!
//! Everything here is `no_std` and executor-agnostic: the firmware spawns
//! the loops as Embassy tasks, host tests drive them with tokio.
#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![allow(async_fn_in_trait)]

#[macro_use]
mod log;

pub mod accumulator;
pub mod button;
pub mod capture;
pub mod channel;
pub mod config;
pub mod counter;
pub mod diag;
pub mod naming;
pub mod owner;
pub mod wav;

pub use accumulator::{Accumulator, AudioBuffer, BufferStorage};
pub use button::{ButtonMonitor, Debouncer, TimestampEvent};
pub use capture::{CaptureLoop, StepOutcome};
pub use channel::{FreeBufferChannel, RequestChannel, StorageRequest, TimestampChannel};
pub use config::RecorderConfig;
pub use counter::{CounterError, RotationCounter};
pub use diag::{Diagnostics, DiagnosticsSnapshot};
pub use naming::SessionNames;
pub use owner::{Phase, StorageError, StorageOwner};
pub use wav::{WavError, WavHeader};
