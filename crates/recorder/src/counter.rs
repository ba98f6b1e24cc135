//! Persistent rotation counter.
//!
//! Each new session takes the next counter value and persists it before the
//! files are opened, so a reboot never reuses a name. Persistence failures
//! are not fatal: the recording goes ahead and the in-memory value keeps
//! counting.

use platform::CounterStore;

/// Counter value could not be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterError<E> {
    /// Store failed; `value` is still valid for this boot.
    NotPersisted {
        /// Value that was handed out anyway.
        value: u32,
        /// Store error.
        error: E,
    },
    /// The counter reached `u32::MAX`.
    Exhausted,
}

impl<E> CounterError<E> {
    /// Short label for logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotPersisted { .. } => "counter not persisted",
            Self::Exhausted => "counter exhausted",
        }
    }
}

/// Rotation counter cached in RAM in front of a [`CounterStore`].
pub struct RotationCounter<C> {
    store: C,
    cached: Option<u32>,
}

impl<C: CounterStore> RotationCounter<C> {
    /// Wrap a store; nothing is read until first use.
    pub const fn new(store: C) -> Self {
        Self { store, cached: None }
    }

    /// Last value handed out (0 if none yet).
    ///
    /// A load failure is logged and treated as 0.
    pub async fn current(&mut self) -> u32 {
        if let Some(value) = self.cached {
            return value;
        }
        let value = match self.store.load().await {
            Ok(value) => value.unwrap_or(0),
            Err(_) => {
                warn!("rotation counter unreadable, starting from 0");
                0
            }
        };
        self.cached = Some(value);
        value
    }

    /// Advance the counter and persist the new value.
    pub async fn increment(&mut self) -> Result<u32, CounterError<C::Error>> {
        let next = self.current().await.checked_add(1).ok_or(CounterError::Exhausted)?;
        self.cached = Some(next);
        match self.store.store(next).await {
            Ok(()) => Ok(next),
            Err(error) => Err(CounterError::NotPersisted { value: next, error }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use platform::mocks::{MemoryCounterStore, MockError};

    #[tokio::test]
    async fn fresh_store_starts_at_one() {
        let store = MemoryCounterStore::default();
        let mut counter = RotationCounter::new(store.clone());
        assert_eq!(counter.current().await, 0);
        assert_eq!(counter.increment().await, Ok(1));
        assert_eq!(counter.increment().await, Ok(2));
        assert_eq!(store.value(), Some(2));
    }

    #[tokio::test]
    async fn resumes_after_reboot() {
        let store = MemoryCounterStore::with_value(41);
        let mut counter = RotationCounter::new(store.clone());
        assert_eq!(counter.increment().await, Ok(42));

        let mut rebooted = RotationCounter::new(store);
        assert_eq!(rebooted.current().await, 42);
    }

    #[tokio::test]
    async fn unreadable_store_counts_from_zero() {
        let store = MemoryCounterStore::with_value(9);
        store.fail_loads(true);
        let mut counter = RotationCounter::new(store);
        assert_eq!(counter.increment().await, Ok(1));
    }

    #[tokio::test]
    async fn failed_store_still_advances() {
        let store = MemoryCounterStore::with_value(3);
        let mut counter = RotationCounter::new(store.clone());
        store.fail_stores(true);
        assert_eq!(
            counter.increment().await,
            Err(CounterError::NotPersisted { value: 4, error: MockError::Io })
        );
        store.fail_stores(false);
        assert_eq!(counter.increment().await, Ok(5));
        assert_eq!(store.value(), Some(5));
    }

    #[tokio::test]
    async fn saturated_counter_is_exhausted() {
        let mut counter = RotationCounter::new(MemoryCounterStore::with_value(u32::MAX));
        assert_eq!(counter.increment().await, Err(CounterError::Exhausted));
    }
}
