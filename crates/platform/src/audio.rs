//! Audio capture abstractions
//!
//! The recorder only ever sees interleaved little-endian PCM bytes. Sources
//! deliver one DMA block per call; sinks take bytes back out for headphone
//! monitoring.

use embassy_time::Duration;

/// Fault reported by a capture source instead of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureFault {
    /// The receive FIFO or ring buffer overflowed; samples were lost.
    Overrun,
    /// The DMA controller reported a transfer error.
    Dma,
}

impl CaptureFault {
    /// Short label for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Overrun => "overrun",
            Self::Dma => "dma error",
        }
    }
}

impl core::fmt::Display for CaptureFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of captured PCM blocks (SAI + DMA on hardware).
pub trait AudioSource {
    /// Wait for the next completed DMA block and copy it into `block`.
    ///
    /// Returns the number of bytes written, at most `block.len()`.
    fn read_block(
        &mut self,
        block: &mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, CaptureFault>>;
}

/// Failure writing to a monitor sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MonitorError {
    /// The sink did not accept the bytes before the deadline.
    Timeout,
    /// The output path reported an error.
    Device,
}

impl MonitorError {
    /// Short label for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Device => "device error",
        }
    }
}

/// Playback path sharing the I2S port, used for live monitoring.
pub trait MonitorSink {
    /// Write `bytes`, giving up after `timeout`. Returns bytes accepted.
    fn write(
        &mut self,
        bytes: &[u8],
        timeout: Duration,
    ) -> impl core::future::Future<Output = Result<usize, MonitorError>>;
}

/// Sink that discards everything, for builds without monitoring.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MonitorSink for NullSink {
    async fn write(&mut self, bytes: &[u8], _timeout: Duration) -> Result<usize, MonitorError> {
        Ok(bytes.len())
    }
}

/// Invalid PCM format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AudioConfigError {
    /// Sample rate is zero.
    ZeroSampleRate,
    /// Channel count is zero.
    ZeroChannels,
    /// Bit depth is not a whole number of bytes between 8 and 32.
    UnsupportedBitDepth,
}

/// PCM stream format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Bits per sample (16 or 24)
    pub bit_depth: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::CD_STEREO
    }
}

impl AudioConfig {
    /// 44.1 kHz, 2 channels, 16-bit: the recorder's capture format.
    pub const CD_STEREO: Self = Self { sample_rate: 44_100, channels: 2, bit_depth: 16 };

    /// Reject formats that cannot be written as PCM WAV.
    pub const fn validate(&self) -> Result<(), AudioConfigError> {
        if self.sample_rate == 0 {
            return Err(AudioConfigError::ZeroSampleRate);
        }
        if self.channels == 0 {
            return Err(AudioConfigError::ZeroChannels);
        }
        if self.bit_depth < 8 || self.bit_depth > 32 || self.bit_depth % 8 != 0 {
            return Err(AudioConfigError::UnsupportedBitDepth);
        }
        Ok(())
    }

    /// Bytes in one interleaved frame (WAV `blockAlign`).
    #[allow(clippy::arithmetic_side_effects)] // u16 * (u16 / 8) for validated formats fits u32
    pub const fn block_align(&self) -> u32 {
        self.channels as u32 * (self.bit_depth as u32 / 8)
    }

    /// Bytes per second of audio (WAV `byteRate`).
    pub const fn byte_rate(&self) -> u32 {
        self.sample_rate.saturating_mul(self.block_align())
    }

    /// Bytes covering `ms` milliseconds of audio, rounded down to whole frames.
    #[allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)] // u32 * u32 fits u64
    pub const fn bytes_for_ms(&self, ms: u32) -> u32 {
        let align = self.block_align();
        if align == 0 {
            return 0;
        }
        let frames = (self.sample_rate as u64 * ms as u64) / 1000;
        let bytes = frames.saturating_mul(align as u64);
        if bytes > u32::MAX as u64 {
            u32::MAX
        } else {
            bytes as u32
        }
    }
}
