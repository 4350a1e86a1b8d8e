//! The typed object store.
//!
//! A `TypedStore<T>` serves records of one concrete type out of a two-level
//! cache layered over a prefix store. Reads fall through to the backing
//! store and install clean cache entries; writes and deletes touch only the
//! cache until a flush. The flush is where determinism lives: dirty keys are
//! applied in lexicographic order, so replicas that performed the same
//! logical writes issue bit-identical backing-store traffic.

use crate::backing::{check_key, StoreIter};
use crate::cache::{CacheConfig, TieredCache};
use crate::prefix::PrefixStore;
use crate::scope::CancelScope;
use punnet_types::codec;
use punnet_types::error::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A pluggable record serializer.
pub trait RecordCodec<T>: Send + Sync {
    /// Serializes a record for the backing store.
    fn encode(&self, value: &T) -> Result<Vec<u8>, StoreError>;

    /// Deserializes a record read from the backing store.
    fn decode(&self, bytes: &[u8]) -> Result<T, StoreError>;
}

/// The default serializer: canonical JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalJsonCodec;

impl<T: Serialize + DeserializeOwned> RecordCodec<T> for CanonicalJsonCodec {
    fn encode(&self, value: &T) -> Result<Vec<u8>, StoreError> {
        codec::to_bytes_canonical(value).map_err(StoreError::Encode)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, StoreError> {
        codec::from_bytes_canonical(bytes).map_err(StoreError::Decode)
    }
}

/// A cache-backed store of records of type `T` under one key prefix.
pub struct TypedStore<T> {
    store: PrefixStore,
    cache: TieredCache<T>,
    codec: Arc<dyn RecordCodec<T>>,
    scope: CancelScope,
    closed: AtomicBool,
}

impl<T: Clone + Send + Sync + 'static> TypedStore<T> {
    /// Creates a store with the canonical JSON serializer.
    pub fn new(store: PrefixStore, config: CacheConfig, scope: CancelScope) -> Self
    where
        T: Serialize + DeserializeOwned,
    {
        Self::with_codec(store, config, Arc::new(CanonicalJsonCodec), scope)
    }

    /// Creates a store with a custom serializer.
    pub fn with_codec(
        store: PrefixStore,
        config: CacheConfig,
        codec: Arc<dyn RecordCodec<T>>,
        scope: CancelScope,
    ) -> Self {
        Self {
            store,
            cache: TieredCache::new(config),
            codec,
            scope,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        self.scope.check()?;
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::StoreClosed)
        } else {
            Ok(())
        }
    }

    /// Gets a record. The cache is consulted first; a miss reads and
    /// deserializes from the backing store and installs a clean entry.
    pub fn get(&self, key: &[u8]) -> Result<Option<T>, StoreError> {
        self.ensure_open()?;
        check_key(key)?;

        if let Some((entry, _)) = self.cache.get(key) {
            return Ok(if entry.deleted { None } else { entry.value });
        }

        match self.store.get(key)? {
            Some(bytes) => {
                let value = self.codec.decode(&bytes)?;
                self.cache.insert_clean(key.to_vec(), value.clone());
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Writes a record into the cache (dirty).
    pub fn set(&self, key: &[u8], value: T) -> Result<(), StoreError> {
        self.ensure_open()?;
        check_key(key)?;
        self.cache.set(key.to_vec(), value);
        Ok(())
    }

    /// Marks a key deleted in the cache (dirty tombstone).
    pub fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.ensure_open()?;
        check_key(key)?;
        self.cache.delete(key.to_vec());
        Ok(())
    }

    /// True when the key resolves to a live record. A cached tombstone is
    /// `false` without touching the backing store.
    pub fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        self.ensure_open()?;
        check_key(key)?;
        if let Some((entry, _)) = self.cache.get(key) {
            return Ok(!entry.deleted);
        }
        self.store.has(key)
    }

    /// An ascending cursor over the raw backing entries of `[start, end)`,
    /// deserializing values on demand. The cursor reflects flushed state
    /// only; flush before iterating when cached writes must be visible.
    pub fn iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<TypedIter<T>, StoreError> {
        self.ensure_open()?;
        Ok(TypedIter {
            inner: self.store.iterator(start, end)?,
            codec: self.codec.clone(),
        })
    }

    /// Applies the sorted dirty set to the backing store. Returns the keys
    /// applied, in order. Flags are untouched here so that a failure leaves
    /// every key retryable.
    fn apply_dirty(&self) -> Result<Vec<Vec<u8>>, StoreError> {
        let mut dirty = self.cache.dirty_entries();
        dirty.sort_by(|a, b| a.0.cmp(&b.0));

        let mut applied = Vec::with_capacity(dirty.len());
        for (key, entry) in dirty {
            self.scope.check()?;
            if entry.deleted {
                self.store.delete(&key)?;
            } else {
                let value = entry.value.as_ref().ok_or_else(|| {
                    StoreError::Backend("live cache entry is missing its value".into())
                })?;
                let bytes = self.codec.encode(value)?;
                self.store.set(&key, &bytes)?;
            }
            applied.push(key);
        }
        Ok(applied)
    }

    /// Flushes: applies the sorted dirty set, flushes the backing store,
    /// then clears the dirty flags for exactly the flushed keys.
    ///
    /// On error the already-applied mutations stay in the backing store but
    /// every dirty flag remains set, so the next flush retries.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let applied = self.apply_dirty()?;
        self.store.flush()?;
        self.cache.clear_dirty_flags(&applied);
        tracing::debug!(target: "store", keys = applied.len(), "flushed typed store");
        Ok(())
    }

    /// Applies the sorted dirty set and clears flags without flushing the
    /// backing store. The caller owns the backing flush; the runtime uses
    /// this to fold many stores into one saved version per block.
    pub fn write_through(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let applied = self.apply_dirty()?;
        self.cache.clear_dirty_flags(&applied);
        Ok(())
    }

    /// Drops the entire cache, including unflushed writes.
    pub fn discard_cache(&self) {
        self.cache.clear();
    }

    /// Closes this store. The prefix store and backing store stay open.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.store.close();
    }

    /// This store's cancellation scope.
    pub fn scope(&self) -> &CancelScope {
        &self.scope
    }
}

/// A typed cursor: deserializes values on demand.
pub struct TypedIter<T> {
    inner: StoreIter,
    codec: Arc<dyn RecordCodec<T>>,
}

impl<T> TypedIter<T> {
    /// Closes the underlying cursor.
    pub fn close(&mut self) {
        self.inner.close();
    }
}

impl<T> Iterator for TypedIter<T> {
    type Item = Result<(Vec<u8>, T), StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, bytes) = self.inner.next()?;
        Some(self.codec.decode(&bytes).map(|value| (key, value)))
    }
}
