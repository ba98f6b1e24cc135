//! Inter-task channels
//!
//! Three bounded FIFOs with static storage connect the pipeline:
//!
//! | Channel | Producer | Consumer | Depth |
//! |---------|----------|----------|-------|
//! | [`TimestampChannel`] | button (ISR / EXTI task) | storage owner | 8 |
//! | [`RequestChannel`] | capture loop | storage owner | 8 |
//! | [`FreeBufferChannel`] | storage owner | capture loop | 2 |
//!
//! Ordering holds within a channel only. Producers in interrupt context use
//! [`try_send_event`], which never blocks; task-context producers may use
//! [`send_with_timeout`]. The storage owner blocks on its receivers
//! indefinitely.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::{with_timeout, Duration};

use crate::accumulator::AudioBuffer;
use crate::button::TimestampEvent;
use crate::config::{AUDIO_BUFFER_COUNT, STORAGE_CHANNEL_DEPTH, TIMESTAMP_CHANNEL_DEPTH};

// Justification for CriticalSectionRawMutex:
// the timestamp channel is written from interrupt context and read from the
// storage task. Each queue operation holds PRIMASK for well under a
// microsecond, against a 23 ms SAI block period.

/// Button → storage owner.
pub type TimestampChannel = Channel<CriticalSectionRawMutex, TimestampEvent, TIMESTAMP_CHANNEL_DEPTH>;
/// Sending half of [`TimestampChannel`].
pub type TimestampSender<'a> = Sender<'a, CriticalSectionRawMutex, TimestampEvent, TIMESTAMP_CHANNEL_DEPTH>;
/// Receiving half of [`TimestampChannel`].
pub type TimestampReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, TimestampEvent, TIMESTAMP_CHANNEL_DEPTH>;

/// Capture loop → storage owner.
pub type RequestChannel = Channel<CriticalSectionRawMutex, StorageRequest, STORAGE_CHANNEL_DEPTH>;
/// Sending half of [`RequestChannel`].
pub type RequestSender<'a> = Sender<'a, CriticalSectionRawMutex, StorageRequest, STORAGE_CHANNEL_DEPTH>;
/// Receiving half of [`RequestChannel`].
pub type RequestReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, StorageRequest, STORAGE_CHANNEL_DEPTH>;

/// Storage owner → capture loop: written buffers coming back empty.
pub type FreeBufferChannel = Channel<CriticalSectionRawMutex, AudioBuffer, AUDIO_BUFFER_COUNT>;
/// Sending half of [`FreeBufferChannel`].
pub type FreeBufferSender<'a> = Sender<'a, CriticalSectionRawMutex, AudioBuffer, AUDIO_BUFFER_COUNT>;
/// Receiving half of [`FreeBufferChannel`].
pub type FreeBufferReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, AudioBuffer, AUDIO_BUFFER_COUNT>;

/// Work for the storage owner. Each variant owns its payload.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageRequest {
    /// Append a full accumulation buffer to the audio file.
    WriteAudio(AudioBuffer),
    /// Append one line to the timestamp file.
    WriteTimestamp(TimestampEvent),
}

impl StorageRequest {
    /// Short label for logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WriteAudio(_) => "write audio",
            Self::WriteTimestamp(_) => "write timestamp",
        }
    }
}

/// Attempt to send without blocking.
///
/// Returns `true` if the item was enqueued, `false` if the channel was full
/// and the item was dropped. Safe in interrupt context.
pub fn try_send_event<T, const N: usize>(tx: &Sender<'_, CriticalSectionRawMutex, T, N>, item: T) -> bool {
    tx.try_send(item).is_ok()
}

/// The channel stayed full until the deadline; the item was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SendTimeout;

/// Task-context send: wait for space, up to `timeout` if one is given.
pub async fn send_with_timeout<T, const N: usize>(
    tx: &Sender<'_, CriticalSectionRawMutex, T, N>,
    item: T,
    timeout: Option<Duration>,
) -> Result<(), SendTimeout> {
    match timeout {
        Some(limit) => with_timeout(limit, tx.send(item)).await.map_err(|_| SendTimeout),
        None => {
            tx.send(item).await;
            Ok(())
        }
    }
}
