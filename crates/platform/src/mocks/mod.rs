//! Mock implementations for testing
//!
//! This module provides mock implementations of all platform traits
//! for use in unit and integration tests.
//!
//! [`MockStorage`] keeps its files in memory and counts how many storage
//! calls are in flight at once, so tests can check that the medium is only
//! ever driven from one context. Inspect it through the [`MockMedium`]
//! handle after the storage has been moved into its owner.

#![cfg(any(test, feature = "std"))]

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use embassy_time::Duration;

use crate::*;

/// Mock storage failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    /// No card in the slot.
    NotPresent,
    /// Operation before mount (or after the card was pulled).
    NotMounted,
    /// File does not exist.
    NotFound,
    /// Injected I/O failure.
    Io,
}

/// Callback run once, in the middle of a write to one file.
type WriteHook = (String, Box<dyn FnOnce() + Send>);

#[derive(Default)]
struct Medium {
    files: BTreeMap<String, Vec<u8>>,
    present: bool,
    mounted: bool,
    mounts: u32,
    fail_writes: bool,
    write_budget: Option<usize>,
    open_handles: usize,
    write_hook: Option<WriteHook>,
    active_calls: usize,
    max_active_calls: usize,
}

fn lock(medium: &Mutex<Medium>) -> MutexGuard<'_, Medium> {
    // A poisoned lock only means another test thread panicked.
    medium.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Counts overlapping storage calls for the lifetime of one call.
struct CallGuard(Arc<Mutex<Medium>>);

impl CallGuard {
    fn enter(medium: &Arc<Mutex<Medium>>) -> Self {
        let mut m = lock(medium);
        m.active_calls = m.active_calls.saturating_add(1);
        m.max_active_calls = m.max_active_calls.max(m.active_calls);
        drop(m);
        Self(Arc::clone(medium))
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        let mut m = lock(&self.0);
        m.active_calls = m.active_calls.saturating_sub(1);
    }
}

/// Yield once so that other tasks can run in the middle of a storage call.
struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

async fn enter_call(medium: &Arc<Mutex<Medium>>) -> CallGuard {
    let guard = CallGuard::enter(medium);
    YieldNow(false).await;
    guard
}

/// In-memory removable medium
pub struct MockStorage {
    medium: Arc<Mutex<Medium>>,
    style: NameStyle,
}

/// Test-side view of a [`MockStorage`]: inspect files, pull the card,
/// inject failures.
#[derive(Clone)]
pub struct MockMedium(Arc<Mutex<Medium>>);

impl MockStorage {
    /// Create a medium with a card inserted, using long file names.
    pub fn new() -> Self {
        let medium = Medium { present: true, ..Medium::default() };
        Self { medium: Arc::new(Mutex::new(medium)), style: NameStyle::Long }
    }

    /// Create a medium that only accepts 8.3 names.
    pub fn short_names() -> Self {
        Self { style: NameStyle::Short, ..Self::new() }
    }

    /// Inspection handle sharing this medium.
    pub fn medium(&self) -> MockMedium {
        MockMedium(Arc::clone(&self.medium))
    }

    fn require_mounted(&self) -> Result<(), MockError> {
        let m = lock(&self.medium);
        if m.present && m.mounted {
            Ok(())
        } else {
            Err(MockError::NotMounted)
        }
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMedium {
    /// Insert or pull the card. Pulling it invalidates the mount.
    pub fn set_present(&self, present: bool) {
        let mut m = lock(&self.0);
        m.present = present;
        if !present {
            m.mounted = false;
        }
    }

    /// Make every subsequent write fail with [`MockError::Io`].
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.0).fail_writes = fail;
    }

    /// Accept only `bytes` more bytes in total, then report short writes.
    pub fn limit_writes(&self, bytes: Option<usize>) {
        lock(&self.0).write_budget = bytes;
    }

    /// Run `hook` during the next write to `name`, after the bytes landed.
    ///
    /// Stands in for work other tasks do while the medium is busy.
    pub fn on_next_write(&self, name: &str, hook: impl FnOnce() + Send + 'static) {
        lock(&self.0).write_hook = Some((name.to_string(), Box::new(hook)));
    }

    /// Copy of a file's content.
    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        lock(&self.0).files.get(name).cloned()
    }

    /// Create a file directly on the medium.
    pub fn put_file(&self, name: &str, content: &[u8]) {
        lock(&self.0).files.insert(name.to_string(), content.to_vec());
    }

    /// Names of all files, sorted.
    pub fn file_names(&self) -> Vec<String> {
        lock(&self.0).files.keys().cloned().collect()
    }

    /// Successful mounts so far.
    pub fn mount_count(&self) -> u32 {
        lock(&self.0).mounts
    }

    /// Files opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        lock(&self.0).open_handles
    }

    /// Highest number of storage calls ever in flight at once.
    pub fn max_concurrent_calls(&self) -> usize {
        lock(&self.0).max_active_calls
    }
}

/// Open file on a [`MockStorage`]
pub struct MockFile {
    medium: Arc<Mutex<Medium>>,
    name: String,
    pos: usize,
}

impl MockFile {
    fn check(&self) -> Result<(), MockError> {
        let m = lock(&self.medium);
        if !(m.present && m.mounted) {
            return Err(MockError::NotMounted);
        }
        if !m.files.contains_key(&self.name) {
            return Err(MockError::NotFound);
        }
        Ok(())
    }
}

impl File for MockFile {
    type Error = MockError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let _call = enter_call(&self.medium).await;
        self.check()?;
        let m = lock(&self.medium);
        let data = m.files.get(&self.name).ok_or(MockError::NotFound)?;
        let available = data.get(self.pos..).unwrap_or(&[]);
        let n = available.len().min(buf.len());
        if let (Some(dst), Some(src)) = (buf.get_mut(..n), available.get(..n)) {
            dst.copy_from_slice(src);
        }
        self.pos = self.pos.saturating_add(n);
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let _call = enter_call(&self.medium).await;
        self.check()?;
        let mut m = lock(&self.medium);
        if m.fail_writes {
            return Err(MockError::Io);
        }
        let n = m.write_budget.map_or(buf.len(), |budget| budget.min(buf.len()));
        if let Some(budget) = m.write_budget.as_mut() {
            *budget = budget.saturating_sub(n);
        }
        let pos = self.pos;
        let data = m.files.get_mut(&self.name).ok_or(MockError::NotFound)?;
        let end = pos.saturating_add(n);
        if data.len() < end {
            data.resize(end, 0);
        }
        if let (Some(dst), Some(src)) = (data.get_mut(pos..end), buf.get(..n)) {
            dst.copy_from_slice(src);
        }
        self.pos = end;
        let hook = match m.write_hook.take() {
            Some((name, hook)) if name == self.name => Some(hook),
            other => {
                m.write_hook = other;
                None
            }
        };
        drop(m);
        if let Some(hook) = hook {
            hook();
        }
        Ok(n)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        let _call = enter_call(&self.medium).await;
        self.check()?;
        self.pos = usize::try_from(pos).map_err(|_| MockError::Io)?;
        Ok(pos)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        let _call = enter_call(&self.medium).await;
        self.check()
    }

    async fn size(&mut self) -> Result<u64, Self::Error> {
        let _call = enter_call(&self.medium).await;
        self.check()?;
        let m = lock(&self.medium);
        let len = m.files.get(&self.name).map_or(0, Vec::len);
        Ok(len as u64)
    }
}

impl Storage for MockStorage {
    type Error = MockError;
    type File = MockFile;

    async fn mount(&mut self) -> Result<MediumInfo, Self::Error> {
        let _call = enter_call(&self.medium).await;
        let mut m = lock(&self.medium);
        if !m.present {
            m.mounted = false;
            return Err(MockError::NotPresent);
        }
        m.mounted = true;
        m.mounts = m.mounts.saturating_add(1);
        Ok(MediumInfo { capacity_bytes: Some(34_359_738_368), kind: VolumeKind::Memory })
    }

    fn unmount(&mut self) {
        let mut m = lock(&self.medium);
        m.mounted = false;
        m.open_handles = 0;
    }

    fn is_mounted(&self) -> bool {
        self.require_mounted().is_ok()
    }

    fn name_style(&self) -> NameStyle {
        self.style
    }

    async fn open_file(&mut self, path: &str, mode: OpenMode) -> Result<Self::File, Self::Error> {
        let _call = enter_call(&self.medium).await;
        self.require_mounted()?;
        let mut m = lock(&self.medium);
        match mode {
            OpenMode::Read if !m.files.contains_key(path) => return Err(MockError::NotFound),
            OpenMode::Read => {}
            OpenMode::CreateTruncate => {
                m.files.insert(path.to_string(), Vec::new());
            }
        }
        m.open_handles = m.open_handles.saturating_add(1);
        Ok(MockFile { medium: Arc::clone(&self.medium), name: path.to_string(), pos: 0 })
    }

    async fn close_file(&mut self, _file: Self::File) -> Result<(), Self::Error> {
        let _call = enter_call(&self.medium).await;
        let mut m = lock(&self.medium);
        m.open_handles = m.open_handles.saturating_sub(1);
        if m.present && m.mounted {
            Ok(())
        } else {
            Err(MockError::NotMounted)
        }
    }

    async fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        let _call = enter_call(&self.medium).await;
        self.require_mounted()?;
        Ok(lock(&self.medium).files.contains_key(path))
    }
}

/// Scripted capture source
///
/// Serves queued blocks and faults in order; once the script is exhausted
/// `read_block` never completes, like a stopped DMA stream.
#[derive(Default)]
pub struct MockAudioSource {
    script: VecDeque<Result<Vec<u8>, CaptureFault>>,
    served: usize,
}

impl MockAudioSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one block.
    pub fn push_block(&mut self, block: &[u8]) {
        self.script.push_back(Ok(block.to_vec()));
    }

    /// Queue one driver fault.
    pub fn push_fault(&mut self, fault: CaptureFault) {
        self.script.push_back(Err(fault));
    }

    /// Blocks and faults handed out so far.
    pub fn served(&self) -> usize {
        self.served
    }
}

impl AudioSource for MockAudioSource {
    async fn read_block(&mut self, block: &mut [u8]) -> Result<usize, CaptureFault> {
        let Some(next) = self.script.pop_front() else {
            return core::future::pending().await;
        };
        self.served = self.served.saturating_add(1);
        let data = next?;
        let n = data.len().min(block.len());
        if let (Some(dst), Some(src)) = (block.get_mut(..n), data.get(..n)) {
            dst.copy_from_slice(src);
        }
        Ok(n)
    }
}

/// Monitor sink that records what it was given
#[derive(Default)]
pub struct MockMonitor {
    /// Bytes accepted so far.
    pub bytes: usize,
    /// Writes attempted so far.
    pub writes: usize,
    /// Timeout seen on the last write.
    pub last_timeout: Option<Duration>,
    stalled: bool,
}

impl MockMonitor {
    /// Create a sink that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink whose writes always time out.
    pub fn stalled() -> Self {
        Self { stalled: true, ..Self::default() }
    }
}

impl MonitorSink for MockMonitor {
    async fn write(&mut self, bytes: &[u8], timeout: Duration) -> Result<usize, MonitorError> {
        self.writes = self.writes.saturating_add(1);
        self.last_timeout = Some(timeout);
        if self.stalled {
            return Err(MonitorError::Timeout);
        }
        self.bytes = self.bytes.saturating_add(bytes.len());
        Ok(bytes.len())
    }
}

/// Scripted button: replays queued edges, then waits forever.
#[derive(Default)]
pub struct MockButton {
    edges: VecDeque<Edge>,
}

impl MockButton {
    /// Create a button from a list of edges.
    pub fn new(edges: &[Edge]) -> Self {
        Self { edges: edges.iter().copied().collect() }
    }
}

impl ButtonInput for MockButton {
    async fn wait_for_edge(&mut self) -> Edge {
        match self.edges.pop_front() {
            Some(edge) => edge,
            None => core::future::pending().await,
        }
    }
}

#[derive(Default)]
struct CounterCell {
    value: Option<u32>,
    fail_loads: bool,
    fail_stores: bool,
    stores: usize,
}

/// Rotation counter held in memory; clones share the same value.
#[derive(Clone, Default)]
pub struct MemoryCounterStore(Arc<Mutex<CounterCell>>);

impl MemoryCounterStore {
    /// Start with `value` already persisted.
    pub fn with_value(value: u32) -> Self {
        let cell = CounterCell { value: Some(value), ..CounterCell::default() };
        Self(Arc::new(Mutex::new(cell)))
    }

    /// Currently persisted value.
    pub fn value(&self) -> Option<u32> {
        self.cell().value
    }

    /// Number of successful stores.
    pub fn stores(&self) -> usize {
        self.cell().stores
    }

    /// Make loads fail.
    pub fn fail_loads(&self, fail: bool) {
        self.cell().fail_loads = fail;
    }

    /// Make stores fail.
    pub fn fail_stores(&self, fail: bool) {
        self.cell().fail_stores = fail;
    }

    fn cell(&self) -> MutexGuard<'_, CounterCell> {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl CounterStore for MemoryCounterStore {
    type Error = MockError;

    async fn load(&mut self) -> Result<Option<u32>, Self::Error> {
        let cell = self.cell();
        if cell.fail_loads {
            return Err(MockError::Io);
        }
        Ok(cell.value)
    }

    async fn store(&mut self, value: u32) -> Result<(), Self::Error> {
        let mut cell = self.cell();
        if cell.fail_stores {
            return Err(MockError::Io);
        }
        cell.value = Some(value);
        cell.stores = cell.stores.saturating_add(1);
        Ok(())
    }
}
