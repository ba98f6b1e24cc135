//! SD-card Storage backend over `embedded-sdmmc`.
//!
//! The card is driven through an [`embedded_sdmmc::VolumeManager`] that the
//! firmware places in a `StaticCell`; [`SdmmcStorage`] and every
//! [`SdmmcFile`] borrow it for `'static`. Files live in the root directory of
//! the first FAT volume and must use 8.3 names ([`NameStyle::Short`]).
//!
//! The volume manager is not reentrant. Only the storage owner task holds an
//! `SdmmcStorage`, so its handles are never used from two contexts.
//!
//! # Card swaps
//!
//! `embedded-sdmmc` runs the card identification handshake only once. The
//! card is therefore wrapped in a [`ReprobingCard`], which marks it stale
//! after a failed transfer or an unmount; the next [`Storage::mount`] sends it
//! back through identification, so a freshly inserted card is picked up.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;
use embedded_sdmmc::{
    Block, BlockCount, BlockDevice, BlockIdx, Mode, RawDirectory, RawFile, RawVolume, SdCard, TimeSource, VolumeIdx,
    VolumeManager,
};

use crate::storage::{File, MediumInfo, NameStyle, OpenMode, Storage, VolumeKind};

/// Error type for SD-card storage operations.
#[derive(Debug)]
pub enum SdmmcError<E: core::fmt::Debug> {
    /// No volume is mounted.
    NotMounted,
    /// A file offset does not fit the FAT 32-bit size field.
    OffsetTooLarge,
    /// Card or filesystem error reported by `embedded-sdmmc`.
    Fs(embedded_sdmmc::Error<E>),
}

impl<E: core::fmt::Debug> SdmmcError<E> {
    /// Short label for logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotMounted => "not mounted",
            Self::OffsetTooLarge => "offset too large",
            Self::Fs(_) => "filesystem error",
        }
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for SdmmcError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SD card ")?;
        f.write_str(self.as_str())
    }
}

impl<E: core::fmt::Debug> From<embedded_sdmmc::Error<E>> for SdmmcError<E> {
    fn from(e: embedded_sdmmc::Error<E>) -> Self {
        Self::Fs(e)
    }
}

/// SD cards always address 512-byte blocks.
const BLOCK_BYTES: u64 = 512;

/// Block device that can be sent back through identification.
pub trait Reidentify: BlockDevice {
    /// Run the full init handshake on the next access.
    fn reidentify(&self);
}

impl<SPI: SpiDevice<u8>, DELAY: DelayNs> Reidentify for SdCard<SPI, DELAY> {
    fn reidentify(&self) {
        self.mark_card_uninit();
    }
}

/// Card wrapper shared by the volume manager and [`SdmmcStorage`].
///
/// The volume manager owns a `&'static ReprobingCard`; the storage keeps a
/// second reference to re-identify the card on mount.
pub struct ReprobingCard<D> {
    card: D,
    stale: AtomicBool,
}

impl<D: Reidentify> ReprobingCard<D> {
    /// Wrap an already identified (or not yet identified) card.
    pub const fn new(card: D) -> Self {
        Self { card, stale: AtomicBool::new(false) }
    }

    /// Flag the card for identification before its next use.
    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::Relaxed);
    }

    /// Whether the next mount re-identifies the card.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Relaxed)
    }

    fn reprobe_if_stale(&self) {
        if self.stale.swap(false, Ordering::Relaxed) {
            self.card.reidentify();
        }
    }

    fn capacity_bytes(&self) -> Option<u64> {
        let blocks = self.card.num_blocks().ok()?;
        Some(u64::from(blocks.0).saturating_mul(BLOCK_BYTES))
    }

    fn track<R>(&self, result: Result<R, D::Error>) -> Result<R, D::Error> {
        if result.is_err() {
            self.mark_stale();
        }
        result
    }
}

impl<D: Reidentify> BlockDevice for &ReprobingCard<D> {
    type Error = D::Error;

    fn read(&self, blocks: &mut [Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        self.track(self.card.read(blocks, start_block_idx))
    }

    fn write(&self, blocks: &[Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        self.track(self.card.write(blocks, start_block_idx))
    }

    fn num_blocks(&self) -> Result<BlockCount, Self::Error> {
        self.track(self.card.num_blocks())
    }
}

type Manager<D, T> = VolumeManager<&'static ReprobingCard<D>, T>;

/// An open file on the card.
pub struct SdmmcFile<D: Reidentify + 'static, T: TimeSource + 'static> {
    manager: &'static Manager<D, T>,
    raw: RawFile,
}

impl<D: Reidentify, T: TimeSource> File for SdmmcFile<D, T> {
    type Error = SdmmcError<D::Error>;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(self.manager.read(self.raw, buf)?)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        // embedded-sdmmc either writes the whole buffer or fails.
        self.manager.write(self.raw, buf)?;
        Ok(buf.len())
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        let offset = u32::try_from(pos).map_err(|_| SdmmcError::OffsetTooLarge)?;
        self.manager.file_seek_from_start(self.raw, offset)?;
        Ok(pos)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(self.manager.flush_file(self.raw)?)
    }

    async fn size(&mut self) -> Result<u64, Self::Error> {
        Ok(u64::from(self.manager.file_length(self.raw)?))
    }
}

#[derive(Clone, Copy)]
struct Mounted {
    volume: RawVolume,
    root: RawDirectory,
}

/// SD-card backed Storage.
///
/// Construct with the firmware's `'static` volume manager and the card it
/// was built over; call [`Storage::mount`] before opening files.
pub struct SdmmcStorage<D: Reidentify + 'static, T: TimeSource + 'static> {
    manager: &'static Manager<D, T>,
    card: &'static ReprobingCard<D>,
    mounted: Option<Mounted>,
}

impl<D: Reidentify, T: TimeSource> SdmmcStorage<D, T> {
    /// Wrap a volume manager. Nothing touches the card until `mount`.
    #[must_use]
    pub const fn new(manager: &'static Manager<D, T>, card: &'static ReprobingCard<D>) -> Self {
        Self { manager, card, mounted: None }
    }

    fn root(&self) -> Result<RawDirectory, SdmmcError<D::Error>> {
        self.mounted.map(|m| m.root).ok_or(SdmmcError::NotMounted)
    }
}

impl<D: Reidentify, T: TimeSource> Storage for SdmmcStorage<D, T> {
    type Error = SdmmcError<D::Error>;
    type File = SdmmcFile<D, T>;

    async fn mount(&mut self) -> Result<MediumInfo, Self::Error> {
        self.unmount();
        self.card.reprobe_if_stale();
        let volume = self.manager.open_raw_volume(VolumeIdx(0))?;
        let root = match self.manager.open_root_dir(volume) {
            Ok(root) => root,
            Err(e) => {
                let _ = self.manager.close_volume(volume);
                return Err(e.into());
            }
        };
        self.mounted = Some(Mounted { volume, root });
        Ok(MediumInfo { capacity_bytes: self.card.capacity_bytes(), kind: VolumeKind::Fat })
    }

    fn unmount(&mut self) {
        // Handles may already be stale after a card pull; the manager still
        // needs its slots back, so errors are ignored.
        if let Some(m) = self.mounted.take() {
            let _ = self.manager.close_dir(m.root);
            let _ = self.manager.close_volume(m.volume);
            // The card may have been swapped while unmounted.
            self.card.mark_stale();
        }
    }

    fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    fn name_style(&self) -> NameStyle {
        NameStyle::Short
    }

    async fn open_file(&mut self, path: &str, mode: OpenMode) -> Result<Self::File, Self::Error> {
        let root = self.root()?;
        let mode = match mode {
            OpenMode::Read => Mode::ReadOnly,
            OpenMode::CreateTruncate => Mode::ReadWriteCreateOrTruncate,
        };
        let raw = self.manager.open_file_in_dir(root, path.trim_start_matches('/'), mode)?;
        Ok(SdmmcFile { manager: self.manager, raw })
    }

    async fn close_file(&mut self, file: Self::File) -> Result<(), Self::Error> {
        Ok(self.manager.close_file(file.raw)?)
    }

    async fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        let root = self.root()?;
        match self.manager.find_directory_entry(root, path.trim_start_matches('/')) {
            Ok(_) => Ok(true),
            Err(embedded_sdmmc::Error::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    use core::sync::atomic::AtomicU32;
    use embassy_futures::block_on;
    use embedded_sdmmc::Timestamp;

    #[derive(Debug)]
    struct BusError;

    /// Card whose block transfers all fail, like an empty slot.
    #[derive(Default)]
    struct EmptySlot {
        reidentified: AtomicU32,
        blocks: Option<u32>,
    }

    impl BlockDevice for EmptySlot {
        type Error = BusError;

        fn read(&self, _blocks: &mut [Block], _start_block_idx: BlockIdx) -> Result<(), BusError> {
            Err(BusError)
        }

        fn write(&self, _blocks: &[Block], _start_block_idx: BlockIdx) -> Result<(), BusError> {
            Err(BusError)
        }

        fn num_blocks(&self) -> Result<BlockCount, BusError> {
            self.blocks.map(BlockCount).ok_or(BusError)
        }
    }

    impl Reidentify for EmptySlot {
        fn reidentify(&self) {
            self.reidentified.fetch_add(1, Ordering::Relaxed);
        }
    }

    struct Epoch;

    impl TimeSource for Epoch {
        fn get_timestamp(&self) -> Timestamp {
            Timestamp { year_since_1970: 0, zero_indexed_month: 0, zero_indexed_day: 0, hours: 0, minutes: 0, seconds: 0 }
        }
    }

    fn storage() -> (SdmmcStorage<EmptySlot, Epoch>, &'static ReprobingCard<EmptySlot>) {
        let card: &'static ReprobingCard<EmptySlot> = Box::leak(Box::new(ReprobingCard::new(EmptySlot::default())));
        let manager = Box::leak(Box::new(VolumeManager::new(card, Epoch)));
        (SdmmcStorage::new(manager, card), card)
    }

    fn reidentified(card: &ReprobingCard<EmptySlot>) -> u32 {
        card.card.reidentified.load(Ordering::Relaxed)
    }

    #[test]
    fn failed_mount_reidentifies_the_card_on_the_next_attempt() {
        let (mut storage, card) = storage();

        // A card identified at boot is used as is.
        assert!(block_on(storage.mount()).is_err());
        assert_eq!(reidentified(card), 0);
        assert!(card.is_stale());

        // The failed read left it stale: a newly inserted card gets the full
        // init handshake instead of being read as if it were still the old one.
        assert!(block_on(storage.mount()).is_err());
        assert_eq!(reidentified(card), 1);
        assert!(block_on(storage.mount()).is_err());
        assert_eq!(reidentified(card), 2);
        assert!(!storage.is_mounted());
    }

    #[test]
    fn transfer_errors_mark_the_card_stale() {
        let card = ReprobingCard::new(EmptySlot::default());
        assert!(!card.is_stale());
        assert!((&card).num_blocks().is_err());
        assert!(card.is_stale());
        assert_eq!(card.capacity_bytes(), None);

        card.reprobe_if_stale();
        assert_eq!(reidentified(&card), 1);
        assert!(!card.is_stale());
        card.reprobe_if_stale();
        assert_eq!(reidentified(&card), 1);
    }

    #[test]
    fn error_labels_are_stable() {
        let e: SdmmcError<BusError> = SdmmcError::NotMounted;
        assert_eq!(e.as_str(), "not mounted");
        assert_eq!(e.to_string(), "SD card not mounted");
        let e: SdmmcError<BusError> = embedded_sdmmc::Error::NotFound.into();
        assert!(matches!(e, SdmmcError::Fs(embedded_sdmmc::Error::NotFound)));
    }

    #[test]
    fn capacity_comes_from_the_block_count() {
        // 32 GB card.
        let card = ReprobingCard::new(EmptySlot { blocks: Some(62_333_952), ..EmptySlot::default() });
        assert_eq!(card.capacity_bytes(), Some(62_333_952 * 512));
        assert!(!card.is_stale());
    }
}
