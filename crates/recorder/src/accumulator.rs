//! Audio accumulation: coalesce DMA blocks into ~100 ms storage writes.
//!
//! Two statically allocated buffers alternate between the capture loop and
//! the storage owner. An [`AudioBuffer`] is a `&'static mut` borrow, so
//! whoever holds it has exclusive access: the capture loop fills one while
//! the owner writes the other, and a buffer only comes back to the capture
//! loop through the free-buffer channel after its write finished.

use crate::config::ACCUMULATOR_CAPACITY;

/// Backing storage for one accumulation buffer.
pub type BufferStorage = [u8; ACCUMULATOR_CAPACITY];

/// Exclusively owned accumulation buffer with a fill offset.
pub struct AudioBuffer {
    data: &'static mut BufferStorage,
    len: usize,
}

impl AudioBuffer {
    /// Wrap static storage; the buffer starts empty.
    pub fn new(data: &'static mut BufferStorage) -> Self {
        Self { data, len: 0 }
    }

    /// Split a pair of static buffers, as handed out by a `StaticCell`.
    pub fn pair(storage: &'static mut [BufferStorage; 2]) -> (Self, Self) {
        let [a, b] = storage;
        (Self::new(a), Self::new(b))
    }

    /// Filled part of the buffer.
    pub fn as_bytes(&self) -> &[u8] {
        self.data.get(..self.len).unwrap_or(&[])
    }

    /// Bytes accumulated so far.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been accumulated.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total capacity.
    pub const fn capacity(&self) -> usize {
        ACCUMULATOR_CAPACITY
    }

    /// Reset the fill offset to zero.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    fn push(&mut self, block: &[u8]) -> Result<(), AccumulateError> {
        let end = self.len.checked_add(block.len()).ok_or(AccumulateError::Overflow)?;
        let dst = self.data.get_mut(self.len..end).ok_or(AccumulateError::Overflow)?;
        dst.copy_from_slice(block);
        self.len = end;
        Ok(())
    }
}

impl core::fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AudioBuffer").field("len", &self.len).finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AudioBuffer {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "AudioBuffer {{ len: {} }}", self.len);
    }
}

/// Block could not be accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccumulateError {
    /// Both buffers are in flight; nothing to append to.
    NoBuffer,
    /// The block does not fit in the remaining capacity.
    Overflow,
}

impl AccumulateError {
    /// Short label for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoBuffer => "no free buffer",
            Self::Overflow => "block exceeds buffer capacity",
        }
    }
}

/// Staging area in front of the storage channel.
///
/// Holds at most one [`AudioBuffer`]; [`Accumulator::append`] hands the
/// buffer out once it crosses the flush threshold.
pub struct Accumulator {
    current: Option<AudioBuffer>,
    threshold: usize,
}

impl Accumulator {
    /// Accumulator that flushes at `threshold` bytes.
    pub const fn new(threshold: usize) -> Self {
        Self { current: None, threshold }
    }

    /// Install an empty buffer to fill next.
    ///
    /// Returns the buffer back if one is already installed.
    pub fn install(&mut self, mut buffer: AudioBuffer) -> Result<(), AudioBuffer> {
        if self.current.is_some() {
            return Err(buffer);
        }
        buffer.clear();
        self.current = Some(buffer);
        Ok(())
    }

    /// Whether a buffer is installed.
    pub const fn has_buffer(&self) -> bool {
        self.current.is_some()
    }

    /// Bytes in the installed buffer.
    pub fn fill(&self) -> usize {
        self.current.as_ref().map_or(0, AudioBuffer::len)
    }

    /// Append one DMA block.
    ///
    /// Returns the full buffer once its fill reaches the threshold; the
    /// accumulator is then empty until the next [`Accumulator::install`].
    pub fn append(&mut self, block: &[u8]) -> Result<Option<AudioBuffer>, AccumulateError> {
        let buffer = self.current.as_mut().ok_or(AccumulateError::NoBuffer)?;
        buffer.push(block)?;
        if buffer.len() >= self.threshold {
            return Ok(self.current.take());
        }
        Ok(None)
    }
}
