//! The in-memory backing store.
//!
//! Intended for tests and tooling; production deployments use the versioned
//! Merkle store or a persistent implementation of [`KvStore`].

use crate::backing::{check_key, KvPair, KvStore, StoreIter};
use punnet_types::error::StoreError;
use std::any::Any;
use std::collections::BTreeMap;
use std::ops::Bound;

/// A `BTreeMap`-backed store with no persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    closed: bool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::StoreClosed)
        } else {
            Ok(())
        }
    }

    /// The number of stored entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Collects the entries of `data` within `[start, end)` in ascending order,
/// defensively copied.
pub(crate) fn collect_range(
    data: &BTreeMap<Vec<u8>, Vec<u8>>,
    start: Option<&[u8]>,
    end: Option<&[u8]>,
) -> Vec<KvPair> {
    if let (Some(s), Some(e)) = (start, end) {
        if s >= e {
            return Vec::new();
        }
    }
    let lower = match start {
        Some(s) => Bound::Included(s),
        None => Bound::Unbounded,
    };
    let upper = match end {
        Some(e) => Bound::Excluded(e),
        None => Bound::Unbounded,
    };
    data.range::<[u8], _>((lower, upper))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_open()?;
        check_key(key)?;
        Ok(self.data.get(key).cloned())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.ensure_open()?;
        check_key(key)?;
        self.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.ensure_open()?;
        check_key(key)?;
        self.data.remove(key);
        Ok(())
    }

    fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        self.ensure_open()?;
        check_key(key)?;
        Ok(self.data.contains_key(key))
    }

    fn iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<StoreIter, StoreError> {
        self.ensure_open()?;
        Ok(StoreIter::new(collect_range(&self.data, start, end)))
    }

    fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<StoreIter, StoreError> {
        self.ensure_open()?;
        let mut entries = collect_range(&self.data, start, end);
        entries.reverse();
        Ok(StoreIter::new(entries))
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.ensure_open()
    }

    fn close(&mut self) -> Result<(), StoreError> {
        // No-op on double close.
        self.closed = true;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
