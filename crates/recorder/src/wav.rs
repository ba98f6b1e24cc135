//! Incremental RIFF/WAVE codec over any [`platform::File`].
//!
//! Files are written as a canonical 44-byte header followed by PCM data.
//! After every append the two size fields are patched in place, so a file
//! cut off by power loss or a card pull still parses up to the last
//! completed append.
//!
//! Header layout (all integers little-endian):
//! ```text
//! [0..4]   "RIFF"
//! [4..8]   riff_size        u32  = file length - 8   (patched)
//! [8..12]  "WAVE"
//! [12..16] "fmt "
//! [16..20] fmt_size         u32  = 16
//! [20..22] audio_format     u16  = 1 (PCM)
//! [22..24] channels         u16
//! [24..28] sample_rate      u32
//! [28..32] byte_rate        u32  = sample_rate * block_align
//! [32..34] block_align      u16  = channels * bits / 8
//! [34..36] bits_per_sample  u16
//! [36..40] "data"
//! [40..44] data_size        u32  = file length - 44  (patched)
//! ```

use platform::{AudioConfig, File};

/// Length of the header written by [`start_file`].
pub const HEADER_LEN: usize = 44;
/// Offset of the RIFF size field.
pub const RIFF_SIZE_OFFSET: u64 = 4;
/// Offset of the data-chunk size field.
pub const DATA_SIZE_OFFSET: u64 = 40;

const HEADER_LEN_U32: u32 = 44;
const RIFF_OVERHEAD: u32 = 8;
const FMT_CHUNK_LEN: u32 = 16;
const FORMAT_PCM: u16 = 1;

const RIFF: [u8; 4] = *b"RIFF";
const WAVE: [u8; 4] = *b"WAVE";
const FMT: [u8; 4] = *b"fmt ";
const DATA: [u8; 4] = *b"data";

/// WAV codec failure, generic over the file's I/O error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WavError<E> {
    /// The file reported an error.
    Io(E),
    /// The medium accepted fewer bytes than requested.
    ShortWrite {
        /// Bytes requested.
        expected: usize,
        /// Bytes the medium took.
        written: usize,
    },
    /// The file ended inside a header or chunk header.
    Truncated,
    /// No `RIFF` / `WAVE` signature.
    NotWave,
    /// A required chunk (`fmt ` or `data`) is missing.
    MissingChunk,
    /// The format is not the expected PCM layout.
    FormatMismatch,
    /// The file would exceed the 4 GiB RIFF limit.
    TooLarge,
}

impl<E> WavError<E> {
    /// Short label for logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Io(_) => "I/O error",
            Self::ShortWrite { .. } => "short write",
            Self::Truncated => "truncated header",
            Self::NotWave => "not a RIFF/WAVE file",
            Self::MissingChunk => "missing chunk",
            Self::FormatMismatch => "unexpected format",
            Self::TooLarge => "file exceeds RIFF size limit",
        }
    }
}

impl<E> core::fmt::Display for WavError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ShortWrite { expected, written } => {
                write!(f, "short write: {written} of {expected} bytes")
            }
            other => f.write_str(other.as_str()),
        }
    }
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for WavError<E> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str());
    }
}

/// Header fields the codec writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    /// PCM format.
    pub format: AudioConfig,
    /// Bytes in the data chunk.
    pub data_len: u32,
}

impl WavHeader {
    /// Header for an empty recording.
    pub const fn empty(format: AudioConfig) -> Self {
        Self { format, data_len: 0 }
    }

    /// Encode the canonical 44-byte header.
    ///
    /// # Safety (lint allow)
    /// All range indices are compile-time constants within `[0, HEADER_LEN)`.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let block_align = u16::try_from(self.format.block_align()).unwrap_or(u16::MAX);
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(&RIFF);
        buf[4..8].copy_from_slice(&riff_size(self.data_len).to_le_bytes());
        buf[8..12].copy_from_slice(&WAVE);
        buf[12..16].copy_from_slice(&FMT);
        buf[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
        buf[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
        buf[22..24].copy_from_slice(&self.format.channels.to_le_bytes());
        buf[24..28].copy_from_slice(&self.format.sample_rate.to_le_bytes());
        buf[28..32].copy_from_slice(&self.format.byte_rate().to_le_bytes());
        buf[32..34].copy_from_slice(&block_align.to_le_bytes());
        buf[34..36].copy_from_slice(&self.format.bit_depth.to_le_bytes());
        buf[36..40].copy_from_slice(&DATA);
        buf[40..44].copy_from_slice(&self.data_len.to_le_bytes());
        buf
    }
}

/// RIFF size for a canonical file holding `data_len` bytes.
const fn riff_size(data_len: u32) -> u32 {
    data_len.saturating_add(HEADER_LEN_U32 - RIFF_OVERHEAD)
}

async fn write_all<F: File>(file: &mut F, bytes: &[u8]) -> Result<(), WavError<F::Error>> {
    let written = file.write(bytes).await.map_err(WavError::Io)?;
    if written != bytes.len() {
        return Err(WavError::ShortWrite { expected: bytes.len(), written });
    }
    Ok(())
}

async fn read_exact<F: File>(file: &mut F, buf: &mut [u8]) -> Result<(), WavError<F::Error>> {
    let mut filled = 0;
    while let Some(rest) = buf.get_mut(filled..) {
        if rest.is_empty() {
            break;
        }
        let n = file.read(rest).await.map_err(WavError::Io)?;
        if n == 0 {
            return Err(WavError::Truncated);
        }
        filled = filled.saturating_add(n);
    }
    Ok(())
}

async fn patch_u32<F: File>(file: &mut F, offset: u64, value: u32) -> Result<(), WavError<F::Error>> {
    file.seek(offset).await.map_err(WavError::Io)?;
    write_all(file, &value.to_le_bytes()).await
}

/// Write a fresh header (RIFF size 36, data size 0) at the start of `file`.
pub async fn start_file<F: File>(file: &mut F, format: &AudioConfig) -> Result<(), WavError<F::Error>> {
    file.seek(0).await.map_err(WavError::Io)?;
    write_all(file, &WavHeader::empty(*format).encode()).await?;
    file.flush().await.map_err(WavError::Io)
}

/// Append PCM bytes at end of file and patch both size fields.
///
/// Returns the new data-chunk size. If the medium takes only part of
/// `bytes`, the header is still patched to cover what landed before the
/// [`WavError::ShortWrite`] is returned, so the file stays parseable.
pub async fn append_data<F: File>(file: &mut F, bytes: &[u8]) -> Result<u32, WavError<F::Error>> {
    let end = file.size().await.map_err(WavError::Io)?;
    if end < HEADER_LEN as u64 {
        return Err(WavError::Truncated);
    }
    let old_data = u32::try_from(end.saturating_sub(HEADER_LEN as u64)).map_err(|_| WavError::TooLarge)?;
    let added = u32::try_from(bytes.len()).map_err(|_| WavError::TooLarge)?;
    old_data
        .checked_add(added)
        .and_then(|d| d.checked_add(HEADER_LEN_U32))
        .ok_or(WavError::TooLarge)?;

    file.seek(end).await.map_err(WavError::Io)?;
    let written = file.write(bytes).await.map_err(WavError::Io)?;
    // `written <= bytes.len()`, which fits u32 per the check above.
    let data_len = old_data.saturating_add(u32::try_from(written).unwrap_or(added));

    patch_u32(file, RIFF_SIZE_OFFSET, riff_size(data_len)).await?;
    patch_u32(file, DATA_SIZE_OFFSET, data_len).await?;
    file.flush().await.map_err(WavError::Io)?;

    if written != bytes.len() {
        return Err(WavError::ShortWrite { expected: bytes.len(), written });
    }
    Ok(data_len)
}

fn le_u16(bytes: &[u8], at: usize) -> u16 {
    let mut raw = [0u8; 2];
    if let Some(src) = bytes.get(at..at.saturating_add(2)) {
        raw.copy_from_slice(src);
    }
    u16::from_le_bytes(raw)
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    if let Some(src) = bytes.get(at..at.saturating_add(4)) {
        raw.copy_from_slice(src);
    }
    u32::from_le_bytes(raw)
}

/// Read chunk headers from `pos` until `id` is found.
///
/// Returns the chunk size and the position of its first payload byte.
/// Unknown chunks are skipped, including their pad byte when the size is odd.
async fn find_chunk<F: File>(file: &mut F, mut pos: u64, id: [u8; 4]) -> Result<(u32, u64), WavError<F::Error>> {
    loop {
        let mut header = [0u8; 8];
        match read_exact(file, &mut header).await {
            Err(WavError::Truncated) => return Err(WavError::MissingChunk),
            other => other?,
        }
        pos = pos.saturating_add(8);
        let size = le_u32(&header, 4);
        if header.get(0..4) == Some(&id[..]) {
            return Ok((size, pos));
        }
        let skip = u64::from(size).saturating_add(u64::from(size & 1));
        pos = file.seek(pos.saturating_add(skip)).await.map_err(WavError::Io)?;
    }
}

/// Parse and validate a header written for `expected`.
///
/// Returns the data-chunk size; the file cursor is left on the first data
/// byte. On error the cursor position is unspecified.
pub async fn read_header<F: File>(file: &mut F, expected: &AudioConfig) -> Result<u32, WavError<F::Error>> {
    file.seek(0).await.map_err(WavError::Io)?;
    let mut riff = [0u8; 12];
    read_exact(file, &mut riff).await?;
    if riff.get(0..4) != Some(&RIFF[..]) || riff.get(8..12) != Some(&WAVE[..]) {
        return Err(WavError::NotWave);
    }

    let (fmt_len, fmt_pos) = find_chunk(file, 12, FMT).await?;
    if fmt_len < FMT_CHUNK_LEN {
        return Err(WavError::FormatMismatch);
    }
    let mut fmt = [0u8; 16];
    read_exact(file, &mut fmt).await?;
    let audio_format = le_u16(&fmt, 0);
    let channels = le_u16(&fmt, 2);
    let sample_rate = le_u32(&fmt, 4);
    let byte_rate = le_u32(&fmt, 8);
    let block_align = le_u16(&fmt, 12);
    let bits = le_u16(&fmt, 14);

    let found = AudioConfig { sample_rate, channels, bit_depth: bits };
    if audio_format != FORMAT_PCM
        || found != *expected
        || byte_rate != expected.byte_rate()
        || u32::from(block_align) != expected.block_align()
    {
        return Err(WavError::FormatMismatch);
    }

    let after_fmt = fmt_pos
        .saturating_add(u64::from(fmt_len))
        .saturating_add(u64::from(fmt_len & 1));
    let pos = file.seek(after_fmt).await.map_err(WavError::Io)?;
    let (data_len, _) = find_chunk(file, pos, DATA).await?;
    Ok(data_len)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use platform::mocks::{MockFile, MockStorage};
    use platform::{OpenMode, Storage};

    const FORMAT: AudioConfig = AudioConfig::CD_STEREO;

    async fn new_file(storage: &mut MockStorage, name: &str) -> MockFile {
        storage.mount().await.unwrap();
        storage.open_file(name, OpenMode::CreateTruncate).await.unwrap()
    }

    #[test]
    fn empty_header_bytes() {
        let h = WavHeader::empty(FORMAT).encode();
        assert_eq!(&h[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(h[4..8].try_into().unwrap()), 36);
        assert_eq!(&h[8..16], b"WAVEfmt ");
        assert_eq!(u32::from_le_bytes(h[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes(h[20..22].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(h[22..24].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(h[24..28].try_into().unwrap()), 44_100);
        assert_eq!(u32::from_le_bytes(h[28..32].try_into().unwrap()), 176_400);
        assert_eq!(u16::from_le_bytes(h[32..34].try_into().unwrap()), 4);
        assert_eq!(u16::from_le_bytes(h[34..36].try_into().unwrap()), 16);
        assert_eq!(&h[36..40], b"data");
        assert_eq!(u32::from_le_bytes(h[40..44].try_into().unwrap()), 0);
    }

    #[tokio::test]
    async fn appends_patch_sizes_and_read_back() {
        let mut storage = MockStorage::new();
        let medium = storage.medium();
        let mut file = new_file(&mut storage, "a.wav").await;
        start_file(&mut file, &FORMAT).await.unwrap();

        let blocks: [&[u8]; 3] = [&[1u8; 1024], &[2u8; 2048], &[3u8; 512]];
        let mut last = 0;
        for block in blocks {
            last = append_data(&mut file, block).await.unwrap();
        }
        assert_eq!(last, 3584);

        let raw = medium.file("a.wav").unwrap();
        assert_eq!(raw.len(), 44 + 3584);
        assert_eq!(u32::from_le_bytes(raw[4..8].try_into().unwrap()), 36 + 3584);

        assert_eq!(read_header(&mut file, &FORMAT).await.unwrap(), 3584);
        let mut data = vec![0u8; 3584];
        read_exact(&mut file, &mut data).await.unwrap();
        assert!(data[..1024].iter().all(|b| *b == 1));
        assert!(data[1024..3072].iter().all(|b| *b == 2));
        assert!(data[3072..].iter().all(|b| *b == 3));
    }

    #[tokio::test]
    async fn short_write_still_patches_header() {
        let mut storage = MockStorage::new();
        let medium = storage.medium();
        let mut file = new_file(&mut storage, "b.wav").await;
        start_file(&mut file, &FORMAT).await.unwrap();
        append_data(&mut file, &[0u8; 100]).await.unwrap();

        medium.limit_writes(Some(30 + 8));
        let err = append_data(&mut file, &[0u8; 100]).await.unwrap_err();
        assert_eq!(err, WavError::ShortWrite { expected: 100, written: 30 });
        medium.limit_writes(None);

        assert_eq!(read_header(&mut file, &FORMAT).await.unwrap(), 130);
    }

    #[tokio::test]
    async fn short_header_write_fails_start() {
        let mut storage = MockStorage::new();
        let medium = storage.medium();
        let mut file = new_file(&mut storage, "c.wav").await;
        medium.limit_writes(Some(10));
        let err = start_file(&mut file, &FORMAT).await.unwrap_err();
        assert_eq!(err, WavError::ShortWrite { expected: 44, written: 10 });
    }

    #[tokio::test]
    async fn append_to_headerless_file_is_truncated() {
        let mut storage = MockStorage::new();
        let mut file = new_file(&mut storage, "d.wav").await;
        assert_eq!(append_data(&mut file, &[1, 2]).await, Err(WavError::Truncated));
    }

    #[tokio::test]
    async fn unknown_chunks_and_pad_bytes_are_skipped() {
        let mut storage = MockStorage::new();
        let medium = storage.medium();
        storage.mount().await.unwrap();

        let canonical = WavHeader { format: FORMAT, data_len: 4 }.encode();
        let mut raw = Vec::new();
        raw.extend_from_slice(&canonical[..12]);
        // Odd-sized LIST chunk: 3 payload bytes + 1 pad byte.
        raw.extend_from_slice(b"LIST");
        raw.extend_from_slice(&3u32.to_le_bytes());
        raw.extend_from_slice(&[9, 9, 9, 0]);
        raw.extend_from_slice(&canonical[12..]);
        raw.extend_from_slice(&[5, 6, 7, 8]);
        medium.put_file("e.wav", &raw);

        let mut file = storage.open_file("e.wav", OpenMode::Read).await.unwrap();
        assert_eq!(read_header(&mut file, &FORMAT).await.unwrap(), 4);
        let mut data = [0u8; 4];
        read_exact(&mut file, &mut data).await.unwrap();
        assert_eq!(data, [5, 6, 7, 8]);
    }

    #[tokio::test]
    async fn wrong_format_is_rejected() {
        let mut storage = MockStorage::new();
        let medium = storage.medium();
        storage.mount().await.unwrap();
        let mono = AudioConfig { channels: 1, ..FORMAT };
        medium.put_file("m.wav", &WavHeader::empty(mono).encode());
        medium.put_file("x.wav", b"RIFX\0\0\0\0WAVE");

        let mut file = storage.open_file("m.wav", OpenMode::Read).await.unwrap();
        assert_eq!(read_header(&mut file, &FORMAT).await, Err(WavError::FormatMismatch));
        let mut file = storage.open_file("x.wav", OpenMode::Read).await.unwrap();
        assert_eq!(read_header(&mut file, &FORMAT).await, Err(WavError::NotWave));
    }

    #[tokio::test]
    async fn inconsistent_byte_rate_is_rejected() {
        let mut storage = MockStorage::new();
        let medium = storage.medium();
        storage.mount().await.unwrap();
        let mut raw = WavHeader::empty(FORMAT).encode();
        raw[28..32].copy_from_slice(&100u32.to_le_bytes());
        medium.put_file("r.wav", &raw);

        let mut file = storage.open_file("r.wav", OpenMode::Read).await.unwrap();
        assert_eq!(read_header(&mut file, &FORMAT).await, Err(WavError::FormatMismatch));
    }

    #[tokio::test]
    async fn missing_data_chunk_is_reported() {
        let mut storage = MockStorage::new();
        let medium = storage.medium();
        storage.mount().await.unwrap();
        let raw = WavHeader::empty(FORMAT).encode();
        medium.put_file("n.wav", &raw[..36]);

        let mut file = storage.open_file("n.wav", OpenMode::Read).await.unwrap();
        assert_eq!(read_header(&mut file, &FORMAT).await, Err(WavError::MissingChunk));
    }
}
