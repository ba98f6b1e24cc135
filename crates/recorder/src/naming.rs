//! File names for one recording session.
//!
//! A session is an audio file plus its timestamp file, both named after the
//! rotation counter value. Media that only take 8.3 names get a shortened
//! form; the index wraps at one million there.

use core::fmt::Write;

use heapless::String;
use platform::NameStyle;

/// Longest name produced (`timestamps_4294967295.txt` is 25 bytes).
pub const MAX_NAME_LEN: usize = 32;

const SHORT_INDEX_MODULUS: u32 = 1_000_000;

/// Paired names for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionNames {
    index: u32,
    audio: String<MAX_NAME_LEN>,
    timestamps: String<MAX_NAME_LEN>,
}

impl SessionNames {
    /// Names for counter value `index`.
    ///
    /// - long: `audio_000042.wav` / `timestamps_000042.txt`
    /// - short: `AU000042.WAV` / `TS000042.TXT`
    pub fn new(index: u32, style: NameStyle) -> Self {
        let mut audio = String::new();
        let mut timestamps = String::new();
        // Both buffers hold the longest possible name, so the writes cannot fail.
        let _ = match style {
            NameStyle::Long => write!(audio, "audio_{index:06}.wav")
                .and_then(|()| write!(timestamps, "timestamps_{index:06}.txt")),
            NameStyle::Short => {
                let short = index % SHORT_INDEX_MODULUS;
                write!(audio, "AU{short:06}.WAV").and_then(|()| write!(timestamps, "TS{short:06}.TXT"))
            }
        };
        Self { index, audio, timestamps }
    }

    /// Counter value the names were built from.
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// WAV file name.
    pub fn audio(&self) -> &str {
        &self.audio
    }

    /// Timestamp file name.
    pub fn timestamps(&self) -> &str {
        &self.timestamps
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn long_names_are_zero_padded() {
        let names = SessionNames::new(42, NameStyle::Long);
        assert_eq!(names.audio(), "audio_000042.wav");
        assert_eq!(names.timestamps(), "timestamps_000042.txt");
        assert_eq!(names.index(), 42);
    }

    #[test]
    fn long_names_grow_past_six_digits() {
        let names = SessionNames::new(u32::MAX, NameStyle::Long);
        assert_eq!(names.audio(), "audio_4294967295.wav");
        assert_eq!(names.timestamps(), "timestamps_4294967295.txt");
    }

    #[test]
    fn short_names_fit_eight_dot_three() {
        let names = SessionNames::new(7, NameStyle::Short);
        assert_eq!(names.audio(), "AU000007.WAV");
        assert_eq!(names.timestamps(), "TS000007.TXT");

        let wrapped = SessionNames::new(1_000_123, NameStyle::Short);
        assert_eq!(wrapped.audio(), "AU000123.WAV");
        assert_eq!(wrapped.index(), 1_000_123);
    }
}
