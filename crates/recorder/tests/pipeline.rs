//! End-to-end pipeline on mock hardware: capture loop, button task and
//! storage owner running concurrently against one mock medium.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing, missing_docs)]

use std::time::Duration;

use embassy_futures::select::{select4, Either4};
use platform::mocks::{MemoryCounterStore, MockAudioSource, MockButton, MockMedium, MockStorage};
use platform::{Edge, NullSink};
use recorder::button::run_button;
use recorder::{
    AudioBuffer, BufferStorage, ButtonMonitor, CaptureLoop, Diagnostics, FreeBufferChannel, RecorderConfig,
    RequestChannel, StorageOwner, TimestampChannel,
};

fn seeded_free_channel() -> FreeBufferChannel {
    let storage: &'static mut [BufferStorage; 2] =
        Box::leak(Box::new([[0u8; recorder::config::ACCUMULATOR_CAPACITY]; 2]));
    let (a, b) = AudioBuffer::pair(storage);
    let free = FreeBufferChannel::new();
    free.try_send(a).unwrap();
    free.try_send(b).unwrap();
    free
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
}

async fn wait_for(medium: &MockMedium, name: &str, len: usize) {
    for _ in 0..1000 {
        if medium.file(name).is_some_and(|f| f.len() >= len) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("{name} never reached {len} bytes");
}

#[tokio::test]
async fn blocks_and_presses_reach_the_medium_through_one_owner() {
    let storage = MockStorage::new();
    let medium = storage.medium();
    let diag = Diagnostics::new();
    let config = RecorderConfig { flush_threshold_bytes: 3584, ..RecorderConfig::default() };

    let requests = RequestChannel::new();
    let timestamps = TimestampChannel::new();
    let free = seeded_free_channel();

    let blocks = [pattern(1024, 1), pattern(2048, 2), pattern(512, 3)];
    let mut source = MockAudioSource::new();
    for block in &blocks {
        source.push_block(block);
    }
    let capture = CaptureLoop::new(source, NullSink, &config, requests.sender(), free.receiver(), &diag);
    let owner = StorageOwner::new(storage, MemoryCounterStore::default(), config, &diag);
    let monitor = ButtonMonitor::new();
    let mut button = MockButton::new(&[Edge::Pressed, Edge::Released]);

    let outcome = select4(
        capture.run(),
        owner.run(requests.receiver(), timestamps.receiver(), free.sender()),
        run_button(&mut button, &monitor, timestamps.sender(), &diag),
        async {
            wait_for(&medium, "audio_000001.wav", 44 + 3584).await;
            wait_for(&medium, "timestamps_000001.txt", 4).await;
        },
    )
    .await;
    assert!(matches!(outcome, Either4::Fourth(())));

    let wav = medium.file("audio_000001.wav").unwrap();
    assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 3584);
    assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 3584);
    assert_eq!(&wav[44..], blocks.concat().as_slice());

    let text = String::from_utf8(medium.file("timestamps_000001.txt").unwrap()).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert_eq!(text.split_whitespace().count(), 2);

    assert_eq!(medium.max_concurrent_calls(), 1);
    // One buffer back in the pool, the other installed and waiting for audio.
    assert_eq!(free.len(), 1);
    assert_eq!(diag.snapshot().dropped_flushes, 0);
}
