//! Storage owner task: the only code that touches the medium.
//!
//! The medium is moved into [`StorageOwner`] at startup, so no other task
//! can reach the driver. Work arrives as [`StorageRequest`]s and timestamp
//! events; each is handled to completion before the next is taken.
//!
//! Phases:
//! - `Unmounted`: every request tries one mount. Failure fails the request
//!   with [`StorageError::Unavailable`] and leaves the phase unchanged.
//! - `Mounted`: medium usable, no files open. The next request opens a
//!   session.
//! - `Recording`: audio and timestamp files open.
//!
//! Transitions:
//! - medium reports not mounted while `Mounted`/`Recording` → session
//!   dropped, `Unmounted`, then re-probed in the same request
//! - audio data size passes the rotation threshold → pending timestamps
//!   written to the closing session, session closed, next session opened
//!   right away
//! - any I/O failure → session closed best-effort, medium unmounted,
//!   `Unmounted`; the failed payload is lost

use core::fmt::Write as _;

use embassy_futures::select::{select, Either};
use embassy_time::Instant;
use heapless::String;
use platform::{CounterStore, File, OpenMode, Storage};

use crate::button::TimestampEvent;
use crate::channel::{FreeBufferSender, RequestReceiver, StorageRequest, TimestampReceiver};
use crate::config::{RecorderConfig, MAX_NAME_ATTEMPTS};
use crate::counter::{CounterError, RotationCounter};
use crate::diag::Diagnostics;
use crate::naming::SessionNames;
use crate::wav::{self, WavError};

/// Longest timestamp line: two u64 values, a space and a newline.
const LINE_CAPACITY: usize = 48;

/// Storage request failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError<E> {
    /// No medium could be mounted.
    Unavailable,
    /// Every candidate file name was already taken, or the counter ran out.
    NamesExhausted,
    /// The medium reported an error.
    Io(E),
    /// The medium accepted fewer bytes than requested.
    ShortWrite {
        /// Bytes requested.
        expected: usize,
        /// Bytes the medium took.
        written: usize,
    },
    /// Audio container error.
    Codec(WavError<E>),
}

impl<E> StorageError<E> {
    /// Short label for logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "medium unavailable",
            Self::NamesExhausted => "no free file name",
            Self::Io(_) => "I/O error",
            Self::ShortWrite { .. } => "short write",
            Self::Codec(e) => e.as_str(),
        }
    }

    /// Whether the session had to be torn down.
    pub const fn ends_session(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ShortWrite { .. } | Self::Codec(_))
    }
}

impl<E> From<WavError<E>> for StorageError<E> {
    fn from(e: WavError<E>) -> Self {
        Self::Codec(e)
    }
}

impl<E> core::fmt::Display for StorageError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for StorageError<E> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str());
    }
}

/// Coarse owner state, for tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// No medium mounted.
    Unmounted,
    /// Medium mounted, no files open.
    Mounted,
    /// Session files open.
    Recording,
}

struct Session<F> {
    names: SessionNames,
    audio: F,
    timestamps: F,
    started_at_ms: u64,
    data_len: u32,
}

enum State<F> {
    Unmounted,
    Mounted,
    Recording(Session<F>),
}

/// Sole owner of the storage medium and the rotation counter.
pub struct StorageOwner<'d, S: Storage, C: CounterStore> {
    storage: S,
    counter: RotationCounter<C>,
    config: RecorderConfig,
    state: State<S::File>,
    diag: &'d Diagnostics,
}

impl<'d, S: Storage, C: CounterStore> StorageOwner<'d, S, C> {
    /// Take ownership of the medium. Nothing is mounted until the first
    /// request arrives.
    pub fn new(storage: S, counter: C, config: RecorderConfig, diag: &'d Diagnostics) -> Self {
        Self { storage, counter: RotationCounter::new(counter), config, state: State::Unmounted, diag }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        match self.state {
            State::Unmounted => Phase::Unmounted,
            State::Mounted => Phase::Mounted,
            State::Recording(_) => Phase::Recording,
        }
    }

    fn session(&self) -> Option<&Session<S::File>> {
        match &self.state {
            State::Recording(session) => Some(session),
            _ => None,
        }
    }

    /// Counter value of the open session.
    pub fn session_index(&self) -> Option<u32> {
        self.session().map(|s| s.names.index())
    }

    /// Monotonic start time of the open session, in milliseconds.
    pub fn session_started_at(&self) -> Option<u64> {
        self.session().map(|s| s.started_at_ms)
    }

    /// Audio bytes in the open session's data chunk.
    pub fn data_len(&self) -> Option<u32> {
        self.session().map(|s| s.data_len)
    }

    /// Borrow the medium.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    async fn ensure_mounted(&mut self) -> Result<(), StorageError<S::Error>> {
        if !matches!(self.state, State::Unmounted) && !self.storage.is_mounted() {
            warn!("medium removed, dropping session");
            self.teardown().await;
        }
        if matches!(self.state, State::Unmounted) {
            match self.storage.mount().await {
                Ok(info) => {
                    match info.capacity_bytes {
                        Some(bytes) => info!("medium mounted: {} volume, {} MiB", info.kind.as_str(), bytes / 1_048_576),
                        None => info!("medium mounted: {} volume, size unknown", info.kind.as_str()),
                    }
                    self.state = State::Mounted;
                }
                Err(_) => {
                    self.diag.record_medium_unavailable();
                    warn!("medium unavailable, request dropped");
                    return Err(StorageError::Unavailable);
                }
            }
        }
        Ok(())
    }

    async fn ensure_session(&mut self) -> Result<(), StorageError<S::Error>> {
        self.ensure_mounted().await?;
        if matches!(self.state, State::Mounted) {
            match self.open_session().await {
                Ok(session) => self.state = State::Recording(session),
                Err(e) => {
                    if e.ends_session() {
                        self.fail(&e).await;
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn next_index(&mut self) -> Result<u32, StorageError<S::Error>> {
        match self.counter.increment().await {
            Ok(index) => Ok(index),
            Err(CounterError::NotPersisted { value, .. }) => {
                warn!("rotation counter {} not persisted", value);
                Ok(value)
            }
            Err(CounterError::Exhausted) => Err(StorageError::NamesExhausted),
        }
    }

    async fn open_session(&mut self) -> Result<Session<S::File>, StorageError<S::Error>> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let names = SessionNames::new(self.next_index().await?, self.storage.name_style());
            if self.names_taken(&names).await? {
                warn!("session {} files already exist, skipping", names.index());
                continue;
            }

            let mut audio = self
                .storage
                .open_file(names.audio(), OpenMode::CreateTruncate)
                .await
                .map_err(StorageError::Io)?;
            if let Err(e) = wav::start_file(&mut audio, &self.config.format).await {
                let _ = self.storage.close_file(audio).await;
                return Err(e.into());
            }
            let timestamps = match self.storage.open_file(names.timestamps(), OpenMode::CreateTruncate).await {
                Ok(file) => file,
                Err(e) => {
                    let _ = self.storage.close_file(audio).await;
                    return Err(StorageError::Io(e));
                }
            };

            self.diag.record_session_opened();
            info!("session {} opened: {}", names.index(), names.audio());
            return Ok(Session { names, audio, timestamps, started_at_ms: Instant::now().as_millis(), data_len: 0 });
        }
        Err(StorageError::NamesExhausted)
    }

    /// Whether either file of a session is already on the medium.
    async fn names_taken(&mut self, names: &SessionNames) -> Result<bool, StorageError<S::Error>> {
        if self.storage.exists(names.audio()).await.map_err(StorageError::Io)? {
            return Ok(true);
        }
        self.storage.exists(names.timestamps()).await.map_err(StorageError::Io)
    }

    /// Close the open session, if any. The medium stays mounted.
    pub async fn close_session(&mut self) -> Result<(), StorageError<S::Error>> {
        let State::Recording(session) = core::mem::replace(&mut self.state, State::Mounted) else {
            return Ok(());
        };
        let index = session.names.index();
        let data_len = session.data_len;
        let audio = self.storage.close_file(session.audio).await;
        let timestamps = self.storage.close_file(session.timestamps).await;
        audio.and(timestamps).map_err(StorageError::Io)?;
        info!("session {} closed, {} audio bytes", index, data_len);
        Ok(())
    }

    /// Close files best-effort and unmount.
    async fn teardown(&mut self) {
        if let State::Recording(session) = core::mem::replace(&mut self.state, State::Unmounted) {
            let _ = self.storage.close_file(session.audio).await;
            let _ = self.storage.close_file(session.timestamps).await;
        }
        self.storage.unmount();
        self.state = State::Unmounted;
    }

    async fn fail(&mut self, error: &StorageError<S::Error>) {
        self.diag.record_storage_failure();
        error!("storage failure: {}, unmounting", error.as_str());
        self.teardown().await;
    }

    /// Append PCM bytes to the session's audio file.
    ///
    /// Returns the data-chunk size after the append. Crossing the rotation
    /// threshold closes the session and opens the next one.
    pub async fn write_audio(&mut self, bytes: &[u8]) -> Result<u32, StorageError<S::Error>> {
        let data_len = self.append_audio(bytes).await?;
        if self.rotation_due() {
            self.rotate().await;
        }
        Ok(data_len)
    }

    /// Whether the open session has passed the rotation threshold.
    pub fn rotation_due(&self) -> bool {
        self.data_len().is_some_and(|len| len > self.config.rotation_threshold_bytes)
    }

    async fn append_audio(&mut self, bytes: &[u8]) -> Result<u32, StorageError<S::Error>> {
        self.ensure_session().await?;
        let result = match &mut self.state {
            State::Recording(session) => match wav::append_data(&mut session.audio, bytes).await {
                Ok(len) => {
                    session.data_len = len;
                    Ok(len)
                }
                Err(e) => Err(StorageError::from(e)),
            },
            _ => return Err(StorageError::Unavailable),
        };
        if let Err(e) = &result {
            self.fail(e).await;
        }
        result
    }

    async fn rotate(&mut self) {
        info!("rotation threshold reached");
        if let Err(e) = self.close_session().await {
            self.fail(&e).await;
            return;
        }
        // The write that triggered rotation already landed; a failure here
        // only delays the next session until the next request.
        match self.open_session().await {
            Ok(session) => self.state = State::Recording(session),
            Err(e) if e.ends_session() => self.fail(&e).await,
            Err(e) => warn!("could not open next session: {}", e.as_str()),
        }
    }

    /// Append one `"{press} {release}\n"` line, offsets in milliseconds from
    /// session start.
    pub async fn write_timestamp(&mut self, event: TimestampEvent) -> Result<(), StorageError<S::Error>> {
        self.ensure_session().await?;
        let State::Recording(session) = &mut self.state else {
            return Err(StorageError::Unavailable);
        };

        let mut line: String<LINE_CAPACITY> = String::new();
        let _ = writeln!(
            line,
            "{} {}",
            event.press_ms.saturating_sub(session.started_at_ms),
            event.release_ms.saturating_sub(session.started_at_ms)
        );

        let result = match session.timestamps.write(line.as_bytes()).await {
            Ok(n) if n == line.len() => session.timestamps.flush().await.map_err(StorageError::Io),
            Ok(n) => Err(StorageError::ShortWrite { expected: line.len(), written: n }),
            Err(e) => Err(StorageError::Io(e)),
        };
        if let Err(e) = result {
            self.fail(&e).await;
            return Err(e);
        }
        debug!("timestamp line written at {} bytes of audio", session.data_len);
        Ok(())
    }

    /// Handle one request. Audio buffers go back to the capture loop
    /// whether or not the write succeeded.
    ///
    /// Pending timestamps are written before each audio buffer, and again
    /// before a rotation: presses that came in while the buffer was being
    /// written still belong to the session that is closing.
    pub async fn handle(
        &mut self,
        request: StorageRequest,
        timestamps: &TimestampReceiver<'_>,
        free: &FreeBufferSender<'_>,
    ) -> Result<(), StorageError<S::Error>> {
        match request {
            StorageRequest::WriteAudio(mut buffer) => {
                self.drain_timestamps(timestamps).await;
                let result = self.append_audio(buffer.as_bytes()).await.map(|_| ());
                buffer.clear();
                free.send(buffer).await;
                if self.rotation_due() {
                    self.drain_timestamps(timestamps).await;
                    self.rotate().await;
                }
                result
            }
            StorageRequest::WriteTimestamp(event) => self.write_timestamp(event).await,
        }
    }

    async fn drain_timestamps(&mut self, timestamps: &TimestampReceiver<'_>) {
        while let Ok(event) = timestamps.try_receive() {
            let _ = self.write_timestamp(event).await;
        }
    }

    /// Owner task body. Timestamps are taken before audio so they land in
    /// the session that was open when they happened.
    pub async fn run(
        mut self,
        requests: RequestReceiver<'_>,
        timestamps: TimestampReceiver<'_>,
        free: FreeBufferSender<'_>,
    ) -> ! {
        loop {
            let request = match select(timestamps.receive(), requests.receive()).await {
                Either::First(event) => StorageRequest::WriteTimestamp(event),
                Either::Second(request) => request,
            };
            if let Err(e) = self.handle(request, &timestamps, &free).await {
                debug!("request failed: {}", e.as_str());
            }
        }
    }
}
