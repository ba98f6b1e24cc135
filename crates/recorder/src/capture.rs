//! Capture loop: DMA blocks in, full accumulation buffers out.
//!
//! The loop never waits on storage. A full request channel costs one
//! buffer's worth of audio, which is counted and logged; the buffer is
//! reused straight away. The only other await points are the next DMA block
//! and, when both buffers are in flight, the next free buffer.

use embassy_sync::channel::TrySendError;
use embassy_time::Duration;
use platform::{AudioSource, CaptureFault, MonitorError, MonitorSink};

use crate::accumulator::Accumulator;
use crate::channel::{FreeBufferReceiver, RequestSender, StorageRequest};
use crate::config::{RecorderConfig, DMA_BLOCK_BYTES, MONITOR_WRITE_TIMEOUT_MS};
use crate::diag::Diagnostics;

/// What one [`CaptureLoop::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepOutcome {
    /// Block appended, threshold not reached.
    Accumulated,
    /// Buffer reached the threshold and was queued for storage.
    Flushed,
    /// Buffer reached the threshold but the request channel was full; its
    /// contents were discarded.
    FlushDropped,
    /// Block did not fit in the buffer and was discarded.
    BlockDropped,
    /// The source reported a fault instead of a block.
    Fault(CaptureFault),
}

/// Audio task state.
pub struct CaptureLoop<'a, S, M> {
    source: S,
    monitor: M,
    block: [u8; DMA_BLOCK_BYTES],
    accumulator: Accumulator,
    requests: RequestSender<'a>,
    free: FreeBufferReceiver<'a>,
    diag: &'a Diagnostics,
    faulted: bool,
}

impl<'a, S: AudioSource, M: MonitorSink> CaptureLoop<'a, S, M> {
    /// Build the loop. Buffers are picked up from `free` as needed, so the
    /// caller seeds that channel with every [`crate::AudioBuffer`].
    pub fn new(
        source: S,
        monitor: M,
        config: &RecorderConfig,
        requests: RequestSender<'a>,
        free: FreeBufferReceiver<'a>,
        diag: &'a Diagnostics,
    ) -> Self {
        Self {
            source,
            monitor,
            block: [0; DMA_BLOCK_BYTES],
            accumulator: Accumulator::new(config.flush_threshold_bytes),
            requests,
            free,
            diag,
            faulted: false,
        }
    }

    /// Bytes accumulated in the current buffer.
    pub fn pending_bytes(&self) -> usize {
        self.accumulator.fill()
    }

    /// Process one DMA block.
    pub async fn step(&mut self) -> StepOutcome {
        if !self.accumulator.has_buffer() {
            let buffer = self.free.receive().await;
            // Nothing is installed, so this cannot be refused.
            let _ = self.accumulator.install(buffer);
        }

        let len = match self.source.read_block(&mut self.block).await {
            Ok(len) => len,
            Err(fault) => {
                self.diag.record_capture_fault(fault);
                if !self.faulted {
                    warn!("capture fault: {}", fault.as_str());
                }
                self.faulted = true;
                return StepOutcome::Fault(fault);
            }
        };
        if self.faulted {
            info!("capture resumed");
            self.faulted = false;
        }
        let block = self.block.get(..len).unwrap_or(&[]);

        match self.monitor.write(block, Duration::from_millis(MONITOR_WRITE_TIMEOUT_MS)).await {
            Ok(_) => {}
            Err(MonitorError::Timeout) => self.diag.record_monitor_timeout(),
            Err(e) => debug!("monitor write failed: {}", e.as_str()),
        }

        match self.accumulator.append(block) {
            Ok(None) => StepOutcome::Accumulated,
            Ok(Some(full)) => match self.requests.try_send(StorageRequest::WriteAudio(full)) {
                Ok(()) => StepOutcome::Flushed,
                Err(TrySendError::Full(request)) => {
                    self.diag.record_dropped_flush();
                    warn!("storage channel full, {} ms of audio dropped", crate::config::FLUSH_INTERVAL_MS);
                    if let StorageRequest::WriteAudio(buffer) = request {
                        let _ = self.accumulator.install(buffer);
                    }
                    StepOutcome::FlushDropped
                }
            },
            Err(e) => {
                warn!("block of {} bytes dropped: {}", len, e.as_str());
                StepOutcome::BlockDropped
            }
        }
    }

    /// Audio task body.
    pub async fn run(mut self) -> ! {
        loop {
            self.step().await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::accumulator::{AudioBuffer, BufferStorage};
    use crate::button::TimestampEvent;
    use crate::channel::{FreeBufferChannel, RequestChannel};
    use crate::config::{ACCUMULATOR_CAPACITY, STORAGE_CHANNEL_DEPTH};
    use platform::mocks::{MockAudioSource, MockMonitor};
    use platform::NullSink;

    fn seed(free: &FreeBufferChannel) {
        let storage: &'static mut [BufferStorage; 2] = Box::leak(Box::new([[0u8; ACCUMULATOR_CAPACITY]; 2]));
        let (a, b) = AudioBuffer::pair(storage);
        free.try_send(a).unwrap();
        free.try_send(b).unwrap();
    }

    fn small_config() -> RecorderConfig {
        RecorderConfig { flush_threshold_bytes: 8192, ..RecorderConfig::default() }
    }

    #[tokio::test]
    async fn blocks_flush_at_threshold() {
        let requests = RequestChannel::new();
        let free = FreeBufferChannel::new();
        seed(&free);
        let diag = Diagnostics::new();

        let mut source = MockAudioSource::new();
        for n in 0..3u8 {
            source.push_block(&[n; DMA_BLOCK_BYTES]);
        }
        let mut capture =
            CaptureLoop::new(source, NullSink, &small_config(), requests.sender(), free.receiver(), &diag);

        assert_eq!(capture.step().await, StepOutcome::Accumulated);
        assert_eq!(capture.step().await, StepOutcome::Flushed);
        assert_eq!(capture.step().await, StepOutcome::Accumulated);
        assert_eq!(capture.pending_bytes(), DMA_BLOCK_BYTES);

        let StorageRequest::WriteAudio(buffer) = requests.try_receive().unwrap() else {
            panic!("expected audio request");
        };
        assert_eq!(buffer.len(), 2 * DMA_BLOCK_BYTES);
        assert!(buffer.as_bytes()[..DMA_BLOCK_BYTES].iter().all(|b| *b == 0));
        assert!(buffer.as_bytes()[DMA_BLOCK_BYTES..].iter().all(|b| *b == 1));
    }

    #[tokio::test]
    async fn full_request_channel_drops_flush_and_reuses_buffer() {
        let requests = RequestChannel::new();
        let free = FreeBufferChannel::new();
        seed(&free);
        let diag = Diagnostics::new();
        let tx = requests.sender();
        for _ in 0..STORAGE_CHANNEL_DEPTH {
            tx.try_send(StorageRequest::WriteTimestamp(TimestampEvent { press_ms: 0, release_ms: 1 })).unwrap();
        }

        let mut source = MockAudioSource::new();
        for _ in 0..4 {
            source.push_block(&[9; DMA_BLOCK_BYTES]);
        }
        let mut capture = CaptureLoop::new(source, NullSink, &small_config(), tx, free.receiver(), &diag);

        capture.step().await;
        assert_eq!(capture.step().await, StepOutcome::FlushDropped);
        assert_eq!(capture.pending_bytes(), 0);
        // Same buffer reused: the second one is still in the free channel.
        assert_eq!(free.len(), 1);
        capture.step().await;
        assert_eq!(capture.step().await, StepOutcome::FlushDropped);
        assert_eq!(diag.snapshot().dropped_flushes, 2);
    }

    #[tokio::test]
    async fn faults_are_counted_and_capture_continues() {
        let requests = RequestChannel::new();
        let free = FreeBufferChannel::new();
        seed(&free);
        let diag = Diagnostics::new();

        let mut source = MockAudioSource::new();
        source.push_fault(CaptureFault::Overrun);
        source.push_fault(CaptureFault::Overrun);
        source.push_fault(CaptureFault::Dma);
        source.push_block(&[1; 64]);
        let mut capture =
            CaptureLoop::new(source, NullSink, &small_config(), requests.sender(), free.receiver(), &diag);

        for _ in 0..3 {
            assert!(matches!(capture.step().await, StepOutcome::Fault(_)));
        }
        assert_eq!(capture.step().await, StepOutcome::Accumulated);
        let snap = diag.snapshot();
        assert_eq!(snap.capture_overruns, 2);
        assert_eq!(snap.capture_dma_errors, 1);
    }

    #[tokio::test]
    async fn stalled_monitor_does_not_stop_accumulation() {
        let requests = RequestChannel::new();
        let free = FreeBufferChannel::new();
        seed(&free);
        let diag = Diagnostics::new();

        let mut source = MockAudioSource::new();
        source.push_block(&[3; 128]);
        let mut capture = CaptureLoop::new(
            source,
            MockMonitor::stalled(),
            &small_config(),
            requests.sender(),
            free.receiver(),
            &diag,
        );

        assert_eq!(capture.step().await, StepOutcome::Accumulated);
        assert_eq!(capture.pending_bytes(), 128);
        assert_eq!(diag.snapshot().monitor_timeouts, 1);
        assert_eq!(capture.monitor.last_timeout, Some(Duration::from_millis(MONITOR_WRITE_TIMEOUT_MS)));
    }

    #[tokio::test]
    async fn waits_for_a_free_buffer() {
        let requests = RequestChannel::new();
        let free = FreeBufferChannel::new();
        let diag = Diagnostics::new();
        let mut source = MockAudioSource::new();
        source.push_block(&[0; 16]);
        let mut capture =
            CaptureLoop::new(source, NullSink, &small_config(), requests.sender(), free.receiver(), &diag);

        let waited = tokio::time::timeout(std::time::Duration::from_millis(20), capture.step()).await;
        assert!(waited.is_err());
        assert_eq!(capture.source.served(), 0);
    }
}
