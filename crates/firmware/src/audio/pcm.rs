//! Conversion between SAI words and the recorder's byte stream.
//!
//! The SAI DMA moves one 16-bit sample per word, left and right slots
//! interleaved, which is exactly the WAV data layout once each word is
//! written little-endian.

/// Write `words` into `out` as little-endian bytes.
///
/// Converts as many whole words as fit; returns the bytes written.
pub fn words_to_bytes(words: &[u16], out: &mut [u8]) -> usize {
    let mut written = 0usize;
    for (word, pair) in words.iter().zip(out.chunks_exact_mut(2)) {
        pair.copy_from_slice(&word.to_le_bytes());
        written = written.saturating_add(2);
    }
    written
}

/// Read little-endian bytes back into words. A trailing odd byte is ignored.
///
/// Returns the words filled.
pub fn bytes_to_words(bytes: &[u8], out: &mut [u16]) -> usize {
    let mut filled = 0usize;
    for (pair, word) in bytes.chunks_exact(2).zip(out.iter_mut()) {
        *word = u16::from_le_bytes([pair.first().copied().unwrap_or(0), pair.get(1).copied().unwrap_or(0)]);
        filled = filled.saturating_add(1);
    }
    filled
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn words_are_little_endian() {
        let mut out = [0u8; 4];
        assert_eq!(words_to_bytes(&[0x1234, 0xABCD], &mut out), 4);
        assert_eq!(out, [0x34, 0x12, 0xCD, 0xAB]);
    }

    #[test]
    fn short_output_truncates_to_whole_words() {
        let mut out = [0u8; 3];
        assert_eq!(words_to_bytes(&[1, 2], &mut out), 2);
        assert_eq!(out[2], 0);
    }

    #[test]
    fn odd_trailing_byte_is_ignored() {
        let mut words = [0u16; 4];
        assert_eq!(bytes_to_words(&[1, 0, 2, 0, 9], &mut words), 2);
        assert_eq!(&words[..2], &[1, 2]);
    }

    proptest! {
        #[test]
        fn monitor_path_sees_captured_samples(words in prop::collection::vec(any::<u16>(), 0..512)) {
            let mut bytes = vec![0u8; words.len() * 2];
            words_to_bytes(&words, &mut bytes);
            let mut back = vec![0u16; words.len()];
            prop_assert_eq!(bytes_to_words(&bytes, &mut back), words.len());
            prop_assert_eq!(back, words);
        }
    }
}
