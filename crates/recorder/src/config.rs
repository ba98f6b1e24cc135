//! Recorder configuration
//!
//! Compile-time constants size the static buffers and channels; the
//! thresholds the storage path acts on are carried at runtime in
//! [`RecorderConfig`] so tests can shrink them.

use platform::dma_safety::CAPTURE_DMA_BLOCK_BYTES;
use platform::AudioConfig;

// ── Capture format ───────────────────────────────────────────────────────────

/// Format of every recording.
pub const FORMAT: AudioConfig = AudioConfig::CD_STEREO;

/// Largest DMA block the capture loop hands to the accumulator.
pub const DMA_BLOCK_BYTES: usize = CAPTURE_DMA_BLOCK_BYTES;

// ── Storage path ─────────────────────────────────────────────────────────────

/// Audio accumulated before one storage write.
pub const FLUSH_INTERVAL_MS: u32 = 100;

/// Bytes in [`FLUSH_INTERVAL_MS`] of audio (17 640 at 44.1 kHz stereo 16-bit).
pub const FLUSH_THRESHOLD_BYTES: usize = FORMAT.bytes_for_ms(FLUSH_INTERVAL_MS) as usize;

/// Accumulator capacity: the flush threshold plus one block of slack, so a
/// block arriving just below the threshold always fits.
pub const ACCUMULATOR_CAPACITY: usize = FLUSH_THRESHOLD_BYTES + DMA_BLOCK_BYTES;

/// Accumulation buffers cycling between the capture loop and storage owner.
pub const AUDIO_BUFFER_COUNT: usize = 2;

/// Recording length after which a new file pair is started (1 hour).
pub const ROTATION_INTERVAL_MS: u32 = 3_600_000;

/// Data-chunk size that triggers rotation (635 040 000 bytes).
pub const ROTATION_THRESHOLD_BYTES: u32 = FORMAT.bytes_for_ms(ROTATION_INTERVAL_MS);

/// Deadline for forwarding one block to the monitor sink.
pub const MONITOR_WRITE_TIMEOUT_MS: u64 = 5;

/// Counter values tried before giving up on finding an unused file name.
pub const MAX_NAME_ATTEMPTS: u32 = 16;

// ── Button ───────────────────────────────────────────────────────────────────

/// Quiet time after a release before a new press is accepted.
pub const DEBOUNCE_QUIET_MS: u64 = 10;

/// A press held longer than this is treated as a missed release.
pub const PRESS_TIMEOUT_MS: u64 = 10_000;

// ── Channels ─────────────────────────────────────────────────────────────────

/// Depth of the button → storage timestamp channel.
pub const TIMESTAMP_CHANNEL_DEPTH: usize = 8;

/// Depth of the storage request channel.
pub const STORAGE_CHANNEL_DEPTH: usize = 8;

const _: () = assert!(FLUSH_THRESHOLD_BYTES == 17_640);
const _: () = assert!(DMA_BLOCK_BYTES <= 4096);
const _: () = assert!(ROTATION_THRESHOLD_BYTES == 635_040_000);
// Header plus a full rotation must stay below the 32-bit RIFF size limit.
const _: () = assert!((ROTATION_THRESHOLD_BYTES as u64) + (ACCUMULATOR_CAPACITY as u64) + 44 < u32::MAX as u64);
const _: () = assert!(STORAGE_CHANNEL_DEPTH >= AUDIO_BUFFER_COUNT);

/// Invalid [`RecorderConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The PCM format itself is invalid.
    Format(platform::AudioConfigError),
    /// Flush threshold is zero or leaves no room for one DMA block.
    FlushThreshold,
    /// Rotation threshold is zero.
    RotationThreshold,
}

impl ConfigError {
    /// Short label for logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Format(_) => "invalid audio format",
            Self::FlushThreshold => "invalid flush threshold",
            Self::RotationThreshold => "invalid rotation threshold",
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime recorder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RecorderConfig {
    /// Format written into every WAV header.
    pub format: AudioConfig,
    /// Accumulated bytes that trigger a storage write.
    pub flush_threshold_bytes: usize,
    /// Data-chunk size after which the session rotates.
    pub rotation_threshold_bytes: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            format: FORMAT,
            flush_threshold_bytes: FLUSH_THRESHOLD_BYTES,
            rotation_threshold_bytes: ROTATION_THRESHOLD_BYTES,
        }
    }
}

impl RecorderConfig {
    /// Check the settings against the static buffer sizes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.format.validate().map_err(ConfigError::Format)?;
        let fits = self
            .flush_threshold_bytes
            .checked_add(DMA_BLOCK_BYTES)
            .is_some_and(|n| n <= ACCUMULATOR_CAPACITY);
        if self.flush_threshold_bytes == 0 || !fits {
            return Err(ConfigError::FlushThreshold);
        }
        if self.rotation_threshold_bytes == 0 {
            return Err(ConfigError::RotationThreshold);
        }
        Ok(())
    }
}
