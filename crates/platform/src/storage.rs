//! Storage abstraction for removable media
//!
//! A [`Storage`] is the medium itself: it is mounted, probed for presence,
//! and hands out [`File`] handles. The recorder moves its `Storage` into a
//! single owner task, so implementations are free to assume one caller at a
//! time.

/// How [`Storage::open_file`] opens a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpenMode {
    /// Open an existing file for reading.
    Read,
    /// Create the file (truncating any existing content) for read + write.
    CreateTruncate,
}

/// File-name convention accepted by the medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NameStyle {
    /// Long file names (`audio_000007.wav`).
    Long,
    /// 8.3 names only (`AU000007.WAV`), FAT without LFN support.
    Short,
}

/// Filesystem family reported at mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VolumeKind {
    /// FAT12/16/32 volume on a card.
    Fat,
    /// Directory on a host filesystem.
    Host,
    /// In-memory medium (tests).
    Memory,
}

impl VolumeKind {
    /// Short label for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fat => "FAT",
            Self::Host => "host",
            Self::Memory => "memory",
        }
    }
}

/// Summary of a freshly mounted medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MediumInfo {
    /// Raw capacity in bytes, when the backend can report it.
    pub capacity_bytes: Option<u64>,
    /// Filesystem family.
    pub kind: VolumeKind,
}

/// Storage trait for removable media
pub trait Storage {
    /// Error type
    type Error: core::fmt::Debug;
    /// File type
    type File: File<Error = Self::Error>;

    /// Probe the medium and mount its filesystem.
    ///
    /// Calling `mount` on an already mounted medium re-probes it.
    fn mount(&mut self) -> impl core::future::Future<Output = Result<MediumInfo, Self::Error>>;

    /// Forget the mounted filesystem. Open files must not be used afterwards.
    fn unmount(&mut self);

    /// Whether the medium is mounted and still present.
    fn is_mounted(&self) -> bool;

    /// Naming convention the mounted filesystem accepts.
    fn name_style(&self) -> NameStyle {
        NameStyle::Long
    }

    /// Open a file in the root directory.
    fn open_file(
        &mut self,
        path: &str,
        mode: OpenMode,
    ) -> impl core::future::Future<Output = Result<Self::File, Self::Error>>;

    /// Close a file, releasing its handle on the medium.
    fn close_file(
        &mut self,
        file: Self::File,
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Check if path exists
    fn exists(
        &mut self,
        path: &str,
    ) -> impl core::future::Future<Output = Result<bool, Self::Error>>;
}

/// Random-access file handle
pub trait File {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read from current position
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, Self::Error>>;

    /// Write at the current position, returning the number of bytes written.
    ///
    /// A count below `buf.len()` means the medium accepted only part of the
    /// data (for instance because it is full).
    fn write(&mut self, buf: &[u8]) -> impl core::future::Future<Output = Result<usize, Self::Error>>;

    /// Seek to an absolute position, returning the new position.
    fn seek(&mut self, pos: u64) -> impl core::future::Future<Output = Result<u64, Self::Error>>;

    /// Make every write so far durable on the medium.
    fn flush(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Current file length in bytes.
    fn size(&mut self) -> impl core::future::Future<Output = Result<u64, Self::Error>>;
}
