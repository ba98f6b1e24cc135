//! Property-based tests for PCM format math.
//! Verifies invariants hold for ALL valid inputs, not just fixed examples.

#![allow(clippy::arithmetic_side_effects)]

use platform::AudioConfig;

fn format() -> impl proptest::strategy::Strategy<Value = AudioConfig> {
    use proptest::prelude::*;
    (8_000u32..=192_000, 1u16..=8, prop_oneof![Just(8u16), Just(16), Just(24), Just(32)])
        .prop_map(|(sample_rate, channels, bit_depth)| AudioConfig { sample_rate, channels, bit_depth })
}

proptest::proptest! {
    /// byteRate is always sampleRate x blockAlign for valid formats.
    #[test]
    fn byte_rate_is_rate_times_block_align(cfg in format()) {
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.byte_rate(), cfg.sample_rate * cfg.block_align());
        assert_eq!(cfg.block_align(), u32::from(cfg.channels) * u32::from(cfg.bit_depth) / 8);
    }

    /// Buffer sizes derived from durations are whole frames.
    #[test]
    fn bytes_for_ms_is_frame_aligned(cfg in format(), ms in 0u32..=10_000) {
        assert_eq!(cfg.bytes_for_ms(ms) % cfg.block_align(), 0);
    }

    /// Longer durations never yield fewer bytes.
    #[test]
    fn bytes_for_ms_is_monotone(cfg in format(), a in 0u32..=100_000, b in 0u32..=100_000) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        assert!(cfg.bytes_for_ms(lo) <= cfg.bytes_for_ms(hi));
    }
}
