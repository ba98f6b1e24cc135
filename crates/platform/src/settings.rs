//! Persisted settings: the file rotation counter
//!
//! The counter survives power cycles so that new recordings never reuse a
//! file name. [`FlashCounterStore`] keeps it in one erase sector of internal
//! flash through the `embedded-storage` NOR traits.
//!
//! # Record layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0      | 4    | magic `RCTR` (little-endian u32 0x5254_4352) |
//! | 4      | 4    | counter value, little-endian u32 |
//!
//! Each record is padded with `0xFF` up to the flash write granularity and
//! occupies one slot. Stores append to the next blank slot; the sector is
//! erased only once every slot is used. The last valid slot wins on load.

use embedded_storage::nor_flash::NorFlash;

/// Persisted rotation counter
pub trait CounterStore {
    /// Error type
    type Error: core::fmt::Debug;

    /// Last stored value, or `None` if nothing was ever stored.
    fn load(&mut self) -> impl core::future::Future<Output = Result<Option<u32>, Self::Error>>;

    /// Persist `value`.
    fn store(&mut self, value: u32) -> impl core::future::Future<Output = Result<(), Self::Error>>;
}

const RECORD_MAGIC: u32 = u32::from_le_bytes(*b"RCTR");
const RECORD_LEN: usize = 8;
const SCRATCH_LEN: usize = 32;

/// Error from [`FlashCounterStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashCounterError<E> {
    /// Underlying flash driver error.
    Flash(E),
    /// Offset is not sector-aligned, or the write granularity exceeds the
    /// scratch record.
    Layout,
}

impl<E> FlashCounterError<E> {
    /// Short label for logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Flash(_) => "flash error",
            Self::Layout => "bad flash layout",
        }
    }
}

/// Rotation counter kept in a dedicated flash sector.
pub struct FlashCounterStore<F> {
    flash: F,
    offset: u32,
    /// Next blank slot, once known.
    next_slot: Option<u32>,
}

impl<F: NorFlash> FlashCounterStore<F> {
    /// Use the erase sector starting at `offset` (relative to the flash base).
    pub fn new(flash: F, offset: u32) -> Result<Self, FlashCounterError<F::Error>> {
        let sector = u32::try_from(F::ERASE_SIZE).map_err(|_| FlashCounterError::Layout)?;
        if sector == 0 || offset % sector != 0 || slot_len::<F>() > SCRATCH_LEN || slot_len::<F>() > F::ERASE_SIZE {
            return Err(FlashCounterError::Layout);
        }
        Ok(Self { flash, offset, next_slot: None })
    }

    /// Release the flash driver.
    pub fn into_inner(self) -> F {
        self.flash
    }

    fn slots() -> u32 {
        u32::try_from(F::ERASE_SIZE.checked_div(slot_len::<F>()).unwrap_or(0)).unwrap_or(0)
    }

    fn slot_offset(&self, slot: u32) -> Result<u32, FlashCounterError<F::Error>> {
        u32::try_from(slot_len::<F>())
            .ok()
            .and_then(|len| slot.checked_mul(len))
            .and_then(|rel| self.offset.checked_add(rel))
            .ok_or(FlashCounterError::Layout)
    }

    fn sector_end(&self) -> Result<u32, FlashCounterError<F::Error>> {
        u32::try_from(F::ERASE_SIZE)
            .ok()
            .and_then(|len| self.offset.checked_add(len))
            .ok_or(FlashCounterError::Layout)
    }

    fn read_slot(&mut self, slot: u32) -> Result<Slot, FlashCounterError<F::Error>> {
        let mut scratch = [0u8; SCRATCH_LEN];
        let len = padded(RECORD_LEN, F::READ_SIZE);
        let at = self.slot_offset(slot)?;
        let buf = scratch.get_mut(..len).ok_or(FlashCounterError::Layout)?;
        self.flash.read(at, buf).map_err(FlashCounterError::Flash)?;

        let mut magic = [0u8; 4];
        let mut value = [0u8; 4];
        magic.copy_from_slice(scratch.get(0..4).ok_or(FlashCounterError::Layout)?);
        value.copy_from_slice(scratch.get(4..8).ok_or(FlashCounterError::Layout)?);
        Ok(match u32::from_le_bytes(magic) {
            RECORD_MAGIC => Slot::Record(u32::from_le_bytes(value)),
            u32::MAX => Slot::Blank,
            _ => Slot::Garbage,
        })
    }

    /// Walk the slots: last record value and first blank slot.
    fn scan(&mut self) -> Result<(Option<u32>, Option<u32>), FlashCounterError<F::Error>> {
        let mut last = None;
        for slot in 0..Self::slots() {
            match self.read_slot(slot)? {
                Slot::Record(value) => last = Some(value),
                Slot::Blank => return Ok((last, Some(slot))),
                // Torn write: skip the slot, later slots may still be valid.
                Slot::Garbage => {}
            }
        }
        Ok((last, None))
    }
}

enum Slot {
    Record(u32),
    Blank,
    Garbage,
}

/// Bytes one record occupies in flash.
fn slot_len<F: NorFlash>() -> usize {
    padded(RECORD_LEN, F::WRITE_SIZE.max(F::READ_SIZE))
}

/// `len` rounded up to a multiple of `align`.
fn padded(len: usize, align: usize) -> usize {
    if align <= 1 {
        return len;
    }
    len.div_ceil(align).saturating_mul(align)
}

impl<F: NorFlash> CounterStore for FlashCounterStore<F> {
    type Error = FlashCounterError<F::Error>;

    async fn load(&mut self) -> Result<Option<u32>, Self::Error> {
        let (last, next) = self.scan()?;
        self.next_slot = next;
        Ok(last)
    }

    async fn store(&mut self, value: u32) -> Result<(), Self::Error> {
        let next = match self.next_slot {
            Some(slot) => Some(slot),
            None => self.scan()?.1,
        };
        let slot = match next {
            Some(slot) => slot,
            None => {
                let end = self.sector_end()?;
                self.flash.erase(self.offset, end).map_err(FlashCounterError::Flash)?;
                0
            }
        };

        let mut scratch = [0xFFu8; SCRATCH_LEN];
        if let Some(head) = scratch.get_mut(0..4) {
            head.copy_from_slice(&RECORD_MAGIC.to_le_bytes());
        }
        if let Some(body) = scratch.get_mut(4..8) {
            body.copy_from_slice(&value.to_le_bytes());
        }
        let record = scratch.get(..slot_len::<F>()).ok_or(FlashCounterError::Layout)?;
        let at = self.slot_offset(slot)?;
        // Invalidate the cursor first so a failed write forces a rescan.
        self.next_slot = None;
        self.flash.write(at, record).map_err(FlashCounterError::Flash)?;
        let following = slot.saturating_add(1);
        self.next_slot = (following < Self::slots()).then_some(following);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use embedded_storage::nor_flash::{ErrorType, NorFlashErrorKind, ReadNorFlash};

    /// 2 sectors of 256 bytes, 32-byte write granularity like the H7 bank.
    struct RamFlash {
        mem: [u8; 512],
        erases: usize,
    }

    impl RamFlash {
        fn new() -> Self {
            Self { mem: [0xFF; 512], erases: 0 }
        }
    }

    impl ErrorType for RamFlash {
        type Error = NorFlashErrorKind;
    }

    impl ReadNorFlash for RamFlash {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            let src = self.mem.get(start..start + bytes.len()).ok_or(NorFlashErrorKind::OutOfBounds)?;
            bytes.copy_from_slice(src);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.mem.len()
        }
    }

    impl NorFlash for RamFlash {
        const WRITE_SIZE: usize = 32;
        const ERASE_SIZE: usize = 256;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            self.erases += 1;
            self.mem[from as usize..to as usize].fill(0xFF);
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            if bytes.len() % Self::WRITE_SIZE != 0 {
                return Err(NorFlashErrorKind::NotAligned);
            }
            let start = offset as usize;
            for (dst, src) in self.mem[start..start + bytes.len()].iter_mut().zip(bytes) {
                // NOR can only clear bits.
                *dst &= *src;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn blank_sector_loads_none() {
        let mut store = FlashCounterStore::new(RamFlash::new(), 256).unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn stores_append_until_the_sector_is_full() {
        let mut store = FlashCounterStore::new(RamFlash::new(), 256).unwrap();
        // 256 / 32 = 8 slots before an erase is needed.
        for value in 1..=8 {
            store.store(value).await.unwrap();
        }
        assert_eq!(store.load().await.unwrap(), Some(8));
        let flash = store.into_inner();
        assert_eq!(flash.erases, 0);
        // The first sector is untouched.
        assert!(flash.mem[..256].iter().all(|b| *b == 0xFF));

        let mut store = FlashCounterStore::new(flash, 256).unwrap();
        store.store(9).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(9));
        let flash = store.into_inner();
        assert_eq!(flash.erases, 1);
        assert!(flash.mem[256 + 32..].iter().all(|b| *b == 0xFF));
    }

    #[tokio::test]
    async fn reload_resumes_at_the_next_blank_slot() {
        let mut store = FlashCounterStore::new(RamFlash::new(), 256).unwrap();
        store.store(41).await.unwrap();
        store.store(42).await.unwrap();

        let mut store = FlashCounterStore::new(store.into_inner(), 256).unwrap();
        assert_eq!(store.load().await.unwrap(), Some(42));
        store.store(43).await.unwrap();
        let flash = store.into_inner();
        assert_eq!(&flash.mem[256 + 64 + 4..256 + 64 + 8], &43u32.to_le_bytes());
        assert_eq!(flash.erases, 0);
    }

    #[tokio::test]
    async fn torn_record_is_skipped() {
        let mut flash = RamFlash::new();
        flash.mem[256..260].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
        flash.mem[260..264].copy_from_slice(&5u32.to_le_bytes());
        // Slot 1 half programmed.
        flash.mem[288..290].fill(0x00);
        flash.mem[320..324].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
        flash.mem[324..328].copy_from_slice(&6u32.to_le_bytes());

        let mut store = FlashCounterStore::new(flash, 256).unwrap();
        assert_eq!(store.load().await.unwrap(), Some(6));
    }

    #[test]
    fn unaligned_offset_is_rejected() {
        assert!(matches!(
            FlashCounterStore::new(RamFlash::new(), 100),
            Err(FlashCounterError::Layout)
        ));
    }

    #[test]
    fn padding_rounds_up_to_granularity() {
        assert_eq!(padded(8, 1), 8);
        assert_eq!(padded(8, 32), 32);
        assert_eq!(padded(33, 32), 64);
    }
}
