//! Local filesystem Storage implementation for host runs.
//!
//! `LocalFileStorage` implements `platform::Storage` using `std::fs`.
//! Used when the `std` feature is enabled (tests and `cargo xtask inspect`).
//! All paths are resolved relative to the root directory provided at
//! construction; "mounting" checks that the directory exists.

use std::fs;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::storage::{File, MediumInfo, OpenMode, Storage, VolumeKind};

/// Error type for local filesystem operations.
#[derive(Debug)]
pub struct LocalStorageError(pub std::io::Error);

impl LocalStorageError {
    fn not_mounted() -> Self {
        Self(std::io::Error::new(ErrorKind::NotConnected, "storage not mounted"))
    }
}

impl core::fmt::Display for LocalStorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "local storage error: {}", self.0)
    }
}

impl std::error::Error for LocalStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// An open file on the local filesystem.
pub struct LocalFile {
    inner: fs::File,
}

impl File for LocalFile {
    type Error = LocalStorageError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Read::read(&mut self.inner, buf).map_err(LocalStorageError)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut written = 0;
        while let Some(rest) = buf.get(written..) {
            if rest.is_empty() {
                break;
            }
            match Write::write(&mut self.inner, rest) {
                Ok(0) => break,
                Ok(n) => written = written.saturating_add(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(LocalStorageError(e)),
            }
        }
        Ok(written)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        Seek::seek(&mut self.inner, SeekFrom::Start(pos)).map_err(LocalStorageError)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.inner.sync_data().map_err(LocalStorageError)
    }

    async fn size(&mut self) -> Result<u64, Self::Error> {
        self.inner.metadata().map(|m| m.len()).map_err(LocalStorageError)
    }
}

/// A `platform::Storage` implementation backed by `std::fs`.
///
/// Paths passed to [`LocalFileStorage::open_file`] and [`LocalFileStorage::exists`]
/// are resolved relative to the root provided at construction.
///
/// # Example
/// ```no_run
/// # async fn example() {
/// use platform::storage_local::LocalFileStorage;
/// use platform::{OpenMode, Storage};
/// let mut storage = LocalFileStorage::new("/media/card");
/// storage.mount().await.unwrap();
/// let file = storage.open_file("audio_000001.wav", OpenMode::Read).await.unwrap();
/// # }
/// ```
pub struct LocalFileStorage {
    root: PathBuf,
    mounted: bool,
}

impl LocalFileStorage {
    /// Create a new storage rooted at `root`.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf(), mounted: false }
    }

    /// Create from the `RECORDINGS_PATH` environment variable.
    ///
    /// Returns `None` if `RECORDINGS_PATH` is not set or is not valid UTF-8.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var("RECORDINGS_PATH").ok().map(Self::new)
    }

    /// Root directory files are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, LocalStorageError> {
        if !self.is_mounted() {
            return Err(LocalStorageError::not_mounted());
        }
        Ok(self.root.join(path.trim_start_matches('/')))
    }
}

impl Storage for LocalFileStorage {
    type Error = LocalStorageError;
    type File = LocalFile;

    async fn mount(&mut self) -> Result<MediumInfo, Self::Error> {
        self.mounted = false;
        let meta = fs::metadata(&self.root).map_err(LocalStorageError)?;
        if !meta.is_dir() {
            return Err(LocalStorageError(std::io::Error::new(
                ErrorKind::InvalidInput,
                "storage root is not a directory",
            )));
        }
        self.mounted = true;
        Ok(MediumInfo { capacity_bytes: None, kind: VolumeKind::Host })
    }

    fn unmount(&mut self) {
        self.mounted = false;
    }

    fn is_mounted(&self) -> bool {
        // Deleting the root directory behaves like pulling the card.
        self.mounted && self.root.is_dir()
    }

    async fn open_file(&mut self, path: &str, mode: OpenMode) -> Result<Self::File, Self::Error> {
        let full = self.resolve(path)?;
        let file = match mode {
            OpenMode::Read => fs::File::open(&full),
            OpenMode::CreateTruncate => fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&full),
        }
        .map_err(LocalStorageError)?;
        Ok(LocalFile { inner: file })
    }

    async fn close_file(&mut self, file: Self::File) -> Result<(), Self::Error> {
        file.inner.sync_all().map_err(LocalStorageError)
    }

    async fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        Ok(self.resolve(path)?.exists())
    }
}
