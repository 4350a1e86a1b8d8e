//! The raw backing-store contract.

use parking_lot::RwLock;
use punnet_types::error::StoreError;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

/// An owned key-value pair returned by store iterators.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// A backing store shared by every prefix store layered above it.
///
/// The store is uniquely owned by the capability manager; only the manager's
/// close may close it.
pub type SharedKvStore = Arc<RwLock<dyn KvStore>>;

/// Wraps a concrete store for sharing across prefix stores.
pub fn share<S: KvStore + 'static>(store: S) -> SharedKvStore {
    Arc::new(RwLock::new(store))
}

/// Rejects empty keys with [`StoreError::InvalidKey`].
pub fn check_key(key: &[u8]) -> Result<(), StoreError> {
    if key.is_empty() {
        Err(StoreError::InvalidKey("store keys must be non-empty".into()))
    } else {
        Ok(())
    }
}

/// The raw byte key-value store contract.
///
/// Keys are non-empty. Iterators yield entries in lexicographic key order
/// over `[start, end)`; `None` bounds denote open ends. Byte slices crossing
/// this boundary are always defensively copied; no internal buffer aliases
/// caller-visible memory.
pub trait KvStore: Send + Sync + Any {
    /// Gets a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Sets a key-value pair.
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Deletes a key. Deleting an absent key is a no-op.
    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;

    /// True when the key is present.
    fn has(&self, key: &[u8]) -> Result<bool, StoreError>;

    /// An ascending cursor over `[start, end)`.
    fn iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<StoreIter, StoreError>;

    /// A descending cursor over `[start, end)`.
    fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<StoreIter, StoreError>;

    /// Persists pending writes. For the versioned variant this is equivalent
    /// to saving a version.
    fn flush(&mut self) -> Result<(), StoreError>;

    /// Closes the store. Further operations return
    /// [`StoreError::StoreClosed`]; a second close is a no-op.
    fn close(&mut self) -> Result<(), StoreError>;

    /// Upcast for downcasting to a concrete store type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to a concrete store type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// An independently closable cursor over a snapshot of store entries.
///
/// Entries are captured (and defensively copied) when the cursor is created,
/// so a cursor never observes writes made after its creation and never
/// aliases store-internal memory.
#[derive(Debug)]
pub struct StoreIter {
    entries: VecDeque<KvPair>,
    closed: bool,
}

impl StoreIter {
    /// Builds a cursor over already-ordered entries.
    pub(crate) fn new(entries: Vec<KvPair>) -> Self {
        Self {
            entries: entries.into(),
            closed: false,
        }
    }

    /// True when the cursor is open and positioned on an entry.
    pub fn valid(&self) -> bool {
        !self.closed && !self.entries.is_empty()
    }

    /// The key at the current position.
    pub fn key(&self) -> Result<&[u8], StoreError> {
        self.entry().map(|(k, _)| k)
    }

    /// The value at the current position.
    pub fn value(&self) -> Result<&[u8], StoreError> {
        self.entry().map(|(_, v)| v)
    }

    /// The entry at the current position.
    pub fn entry(&self) -> Result<(&[u8], &[u8]), StoreError> {
        if self.closed {
            return Err(StoreError::IteratorClosed);
        }
        self.entries
            .front()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
            .ok_or_else(|| StoreError::Backend("iterator is exhausted".into()))
    }

    /// Takes the current entry and advances. `Ok(None)` when exhausted.
    pub fn advance(&mut self) -> Result<Option<KvPair>, StoreError> {
        if self.closed {
            return Err(StoreError::IteratorClosed);
        }
        Ok(self.entries.pop_front())
    }

    /// Closes the cursor, releasing its snapshot. Idempotent.
    pub fn close(&mut self) {
        self.closed = true;
        self.entries.clear();
    }

    /// True once the cursor has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Iterator for StoreIter {
    type Item = KvPair;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        self.entries.pop_front()
    }
}
