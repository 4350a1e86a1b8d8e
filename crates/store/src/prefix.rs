//! The byte-prefix store wrapper.
//!
//! A `PrefixStore` scopes every key of calls routed through it under an
//! immutable, non-empty byte prefix, and strips that prefix from every key
//! its iterators return. Module isolation lives at this layer: a capability
//! holding a prefix store for `module/bank/` cannot name a key outside that
//! slice of the backing store.

use crate::backing::{check_key, SharedKvStore, StoreIter};
use punnet_types::error::StoreError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Returns the lexicographically smallest key strictly greater than every
/// key carrying `prefix`, or `None` when no such bound exists (the prefix is
/// empty or all `0xFF`).
pub fn prefix_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    if prefix.is_empty() {
        return None;
    }
    let mut bound = prefix.to_vec();
    for i in (0..bound.len()).rev() {
        if bound[i] != 0xFF {
            bound[i] += 1;
            bound.truncate(i + 1);
            return Some(bound);
        }
    }
    None
}

/// A store view whose keys all live under one immutable prefix of a shared
/// backing store.
///
/// Closing the wrapper never closes its parent; only the capability
/// manager's close reaches the backing store.
pub struct PrefixStore {
    parent: SharedKvStore,
    prefix: Vec<u8>,
    closed: AtomicBool,
}

impl PrefixStore {
    /// Creates a prefix store over `parent`.
    ///
    /// # Panics
    /// Panics when `prefix` is empty; constructing an unprefixed wrapper is
    /// a programmer error, not a recoverable condition.
    pub fn new(parent: SharedKvStore, prefix: impl Into<Vec<u8>>) -> Self {
        let prefix = prefix.into();
        assert!(!prefix.is_empty(), "prefix store requires a non-empty prefix");
        Self {
            parent,
            prefix,
            closed: AtomicBool::new(false),
        }
    }

    /// Creates a child view with `sub` appended to this store's prefix.
    pub fn child(&self, sub: &[u8]) -> Self {
        assert!(!sub.is_empty(), "prefix store requires a non-empty prefix");
        let mut prefix = self.prefix.clone();
        prefix.extend_from_slice(sub);
        Self {
            parent: self.parent.clone(),
            prefix,
            closed: AtomicBool::new(false),
        }
    }

    /// This store's full prefix.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::StoreClosed)
        } else {
            Ok(())
        }
    }

    fn qualified(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        check_key(key)?;
        Ok([self.prefix.as_slice(), key].concat())
    }

    /// Gets a value by unprefixed key.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_open()?;
        let key = self.qualified(key)?;
        self.parent.read().get(&key)
    }

    /// Sets a key-value pair under the prefix.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.ensure_open()?;
        let key = self.qualified(key)?;
        self.parent.write().set(&key, value)
    }

    /// Deletes a key under the prefix.
    pub fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.ensure_open()?;
        let key = self.qualified(key)?;
        self.parent.write().delete(&key)
    }

    /// True when the unprefixed key is present.
    pub fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let key = self.qualified(key)?;
        self.parent.read().has(&key)
    }

    fn bounds(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> (Vec<u8>, Option<Vec<u8>>) {
        let lo = match start {
            Some(s) => [self.prefix.as_slice(), s].concat(),
            None => self.prefix.clone(),
        };
        let hi = match end {
            Some(e) => Some([self.prefix.as_slice(), e].concat()),
            None => prefix_bound(&self.prefix),
        };
        (lo, hi)
    }

    fn strip(&self, iter: StoreIter) -> StoreIter {
        let prefix_len = self.prefix.len();
        let entries = iter
            .map(|(k, v)| (k[prefix_len..].to_vec(), v))
            .collect();
        StoreIter::new(entries)
    }

    /// An ascending cursor over the unprefixed range `[start, end)`.
    /// Returned keys have the prefix stripped.
    pub fn iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<StoreIter, StoreError> {
        self.ensure_open()?;
        let (lo, hi) = self.bounds(start, end);
        let raw = self.parent.read().iterator(Some(&lo), hi.as_deref())?;
        Ok(self.strip(raw))
    }

    /// A descending cursor over the unprefixed range `[start, end)`.
    pub fn reverse_iterator(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<StoreIter, StoreError> {
        self.ensure_open()?;
        let (lo, hi) = self.bounds(start, end);
        let raw = self
            .parent
            .read()
            .reverse_iterator(Some(&lo), hi.as_deref())?;
        Ok(self.strip(raw))
    }

    /// Flushes the parent store.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.parent.write().flush()
    }

    /// Closes this wrapper only. The parent stays open.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backing::share;
    use crate::memory::MemoryStore;
    use proptest::prelude::*;

    fn prefixed() -> (SharedKvStore, PrefixStore) {
        let backing = share(MemoryStore::new());
        let store = PrefixStore::new(backing.clone(), b"module/bank/".to_vec());
        (backing, store)
    }

    #[test]
    fn keys_are_qualified_exactly() {
        let (backing, store) = prefixed();
        store.set(b"alice/stake", b"100").unwrap();

        let raw = backing.read().get(b"module/bank/alice/stake").unwrap();
        assert_eq!(raw, Some(b"100".to_vec()));
        assert_eq!(store.get(b"alice/stake").unwrap(), Some(b"100".to_vec()));
        assert!(store.has(b"alice/stake").unwrap());

        store.delete(b"alice/stake").unwrap();
        assert!(!backing.read().has(b"module/bank/alice/stake").unwrap());
    }

    #[test]
    fn iterator_strips_exactly_the_prefix() {
        let (backing, store) = prefixed();
        store.set(b"b", b"2").unwrap();
        store.set(b"a", b"1").unwrap();
        // A neighbor outside the prefix must not leak in.
        backing.write().set(b"module/bankx", b"leak").unwrap();
        backing.write().set(b"module/auth/a", b"leak").unwrap();

        let entries: Vec<_> = store.iterator(None, None).unwrap().collect();
        assert_eq!(
            entries,
            vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec()),
            ]
        );
    }

    #[test]
    fn ranged_iteration_in_unprefixed_space() {
        let (_backing, store) = prefixed();
        for key in ["a", "b", "c", "d"] {
            store.set(key.as_bytes(), key.as_bytes()).unwrap();
        }
        let keys: Vec<Vec<u8>> = store
            .iterator(Some(b"b"), Some(b"d"))
            .unwrap()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);

        let keys: Vec<Vec<u8>> = store
            .reverse_iterator(None, None)
            .unwrap()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(
            keys,
            vec![b"d".to_vec(), b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]
        );
    }

    #[test]
    fn child_prefixes_compose() {
        let (backing, store) = prefixed();
        let child = store.child(b"balance/");
        child.set(b"alice/stake", b"7").unwrap();
        assert_eq!(
            backing.read().get(b"module/bank/balance/alice/stake").unwrap(),
            Some(b"7".to_vec())
        );
    }

    #[test]
    fn close_does_not_close_parent() {
        let (backing, store) = prefixed();
        store.set(b"k", b"v").unwrap();
        store.close();
        assert!(matches!(store.get(b"k"), Err(StoreError::StoreClosed)));
        // Parent still serves reads.
        assert!(backing.read().has(b"module/bank/k").unwrap());
    }

    #[test]
    #[should_panic(expected = "non-empty prefix")]
    fn empty_prefix_panics() {
        let backing = share(MemoryStore::new());
        let _ = PrefixStore::new(backing, Vec::new());
    }

    #[test]
    fn prefix_bound_cases() {
        assert_eq!(prefix_bound(b"abc"), Some(b"abd".to_vec()));
        assert_eq!(prefix_bound(&[0x01, 0xFF]), Some(vec![0x02]));
        assert_eq!(prefix_bound(&[0xFF, 0xFF]), None);
        assert_eq!(prefix_bound(b""), None);
    }

    proptest! {
        // prefix_bound(P) is the smallest key > every key with prefix P.
        #[test]
        fn prefix_bound_is_a_tight_upper_bound(
            prefix in proptest::collection::vec(any::<u8>(), 1..8),
            suffix in proptest::collection::vec(any::<u8>(), 0..8),
        ) {
            let mut key = prefix.clone();
            key.extend_from_slice(&suffix);
            match prefix_bound(&prefix) {
                Some(bound) => {
                    // Every key with the prefix sorts strictly below the bound.
                    prop_assert!(key < bound);
                    // The bound itself does not carry the prefix.
                    prop_assert!(!bound.starts_with(&prefix));
                }
                None => {
                    // Only an all-0xFF prefix has no bound.
                    prop_assert!(prefix.iter().all(|b| *b == 0xFF));
                }
            }
        }
    }
}
