//! Hardware Abstraction Layer (HAL) for the field recorder
//!
//! This crate provides trait-based abstractions for every piece of hardware
//! the recording pipeline touches, enabling development and testing without
//! physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (firmware crate)
//!         ↓
//! Pipeline Layer (recorder: debounce, accumulator, WAV codec, storage owner)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (Embassy HAL + embedded-sdmmc)
//! ```
//!
//! # Abstractions
//!
//! - [`Storage`] / [`File`] - removable medium with random-access files
//! - [`AudioSource`] - "next DMA block or fault" capture interface
//! - [`MonitorSink`] - "write bytes with timeout" playback passthrough
//! - [`ButtonInput`] - edge source for the timestamp button
//! - [`CounterStore`] - persisted rotation counter
//!
//! # Features
//!
//! - `std`: host backends ([`storage_local`]) and [`mocks`]
//! - `sdmmc`: SD card backend over `embedded-sdmmc`
//! - `defmt`: Enable defmt derives on public types
//!
//! # Example
//!
//! ```no_run
//! use platform::{File, OpenMode, Storage};
//!
//! async fn example<S: Storage>(storage: &mut S) -> Result<(), S::Error> {
//!     storage.mount().await?;
//!     let mut file = storage.open_file("audio_000001.wav", OpenMode::Read).await?;
//!     let _len = file.size().await?;
//!     storage.close_file(file).await
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors: callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod audio;
pub mod config;
pub mod dma_safety;
pub mod input;
pub mod mocks;
pub mod settings;
pub mod storage;
#[cfg(any(test, feature = "std"))]
pub mod storage_local;
#[cfg(feature = "sdmmc")]
pub mod storage_sdmmc;

// Re-export main high-level traits
pub use audio::{AudioConfig, AudioConfigError, AudioSource, CaptureFault, MonitorError, MonitorSink, NullSink};
pub use input::{ButtonInput, Edge};
pub use settings::{CounterStore, FlashCounterError, FlashCounterStore};
pub use storage::{File, MediumInfo, NameStyle, OpenMode, Storage, VolumeKind};
