//! The two-level write-through cache.
//!
//! L1 is small and hot; L2 is large. Reads promote L2 hits into L1; writes
//! land in L1 with the dirty bit set; deletes leave dirty tombstones. A
//! dirty entry evicted from L1 demotes into L2 with its bits preserved, and
//! L2 never evicts a dirty entry: it grows under dirty pressure until a
//! flush clears the bits.
//!
//! All operations are safe under concurrent readers and a single writer.
//! Readers may observe stale values between concurrent writes on different
//! keys but never a torn entry.

use lru::LruCache;
use parking_lot::RwLock;
use std::num::NonZeroUsize;

/// A cached record with its write-state bits.
///
/// `deleted` entries are tombstones: they shadow the backing store until the
/// next flush applies the deletion. A tombstone carries no value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry<T> {
    /// The cached value; `None` for tombstones.
    pub value: Option<T>,
    /// True when the entry has not yet been flushed to the backing store.
    pub dirty: bool,
    /// True when the entry is a deletion tombstone.
    pub deleted: bool,
}

impl<T> CacheEntry<T> {
    /// A dirty live entry, as produced by a write.
    pub fn dirty(value: T) -> Self {
        Self {
            value: Some(value),
            dirty: true,
            deleted: false,
        }
    }

    /// A clean live entry, as installed from a backing-store read.
    pub fn clean(value: T) -> Self {
        Self {
            value: Some(value),
            dirty: false,
            deleted: false,
        }
    }

    /// A dirty deletion tombstone.
    pub fn tombstone() -> Self {
        Self {
            value: None,
            dirty: true,
            deleted: true,
        }
    }
}

/// The cache level a lookup was served from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheLevel {
    /// The small, hot level.
    L1,
    /// The large level below it.
    L2,
}

/// Cache geometry for a typed store.
#[derive(Clone, Copy, Debug)]
pub struct CacheConfig {
    /// L1 capacity in entries.
    pub l1_capacity: usize,
    /// Initial L2 capacity in entries (grows under dirty pressure).
    pub l2_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_capacity: 128,
            l2_capacity: 1024,
        }
    }
}

struct Tiers<T> {
    l1: LruCache<Vec<u8>, CacheEntry<T>>,
    l2: LruCache<Vec<u8>, CacheEntry<T>>,
}

impl<T> Tiers<T> {
    /// Inserts into L1, demoting a dirty eviction victim into L2 and
    /// dropping a clean one.
    fn put_l1(&mut self, key: Vec<u8>, entry: CacheEntry<T>) {
        if let Some((evicted_key, evicted)) = self.l1.push(key.clone(), entry) {
            if evicted_key != key && evicted.dirty {
                self.put_l2(evicted_key, evicted);
            }
        }
    }

    /// Inserts into L2. When L2 is full and its LRU victim is dirty, the
    /// capacity is doubled instead of evicting the victim.
    fn put_l2(&mut self, key: Vec<u8>, entry: CacheEntry<T>) {
        let cap = self.l2.cap().get();
        if self.l2.len() >= cap {
            let victim_dirty = self
                .l2
                .peek_lru()
                .map(|(_, e)| e.dirty)
                .unwrap_or(false);
            if victim_dirty {
                let grown = NonZeroUsize::new(cap * 2).expect("doubled capacity is non-zero");
                self.l2.resize(grown);
                tracing::debug!(target: "store", capacity = cap * 2, "grew L2 under dirty pressure");
            }
        }
        if let Some((evicted_key, evicted)) = self.l2.push(key.clone(), entry) {
            if evicted_key != key && evicted.dirty {
                // The guard above makes a dirty eviction unreachable; keep
                // the entry anyway rather than lose an unflushed write.
                let grown = NonZeroUsize::new(self.l2.cap().get() * 2)
                    .expect("doubled capacity is non-zero");
                self.l2.resize(grown);
                self.l2.push(evicted_key, evicted);
            }
        }
    }
}

/// The two-level LRU cache used by every typed store.
pub struct TieredCache<T> {
    inner: RwLock<Tiers<T>>,
}

impl<T: Clone> TieredCache<T> {
    /// Creates a cache with the given geometry. Zero capacities are clamped
    /// to one entry.
    pub fn new(config: CacheConfig) -> Self {
        let l1 = NonZeroUsize::new(config.l1_capacity.max(1)).expect("clamped to >= 1");
        let l2 = NonZeroUsize::new(config.l2_capacity.max(1)).expect("clamped to >= 1");
        Self {
            inner: RwLock::new(Tiers {
                l1: LruCache::new(l1),
                l2: LruCache::new(l2),
            }),
        }
    }

    /// Looks up a key, promoting an L2 hit into L1. The returned entry is a
    /// copy; the level reports where it was found.
    pub fn get(&self, key: &[u8]) -> Option<(CacheEntry<T>, CacheLevel)> {
        let mut tiers = self.inner.write();
        if let Some(entry) = tiers.l1.get(key) {
            return Some((entry.clone(), CacheLevel::L1));
        }
        if let Some(entry) = tiers.l2.pop(key) {
            tiers.put_l1(key.to_vec(), entry.clone());
            return Some((entry, CacheLevel::L2));
        }
        None
    }

    /// Looks up a key without promoting it. Used by concurrent readers.
    pub fn peek(&self, key: &[u8]) -> Option<(CacheEntry<T>, CacheLevel)> {
        let tiers = self.inner.read();
        if let Some(entry) = tiers.l1.peek(key) {
            return Some((entry.clone(), CacheLevel::L1));
        }
        tiers
            .l2
            .peek(key)
            .map(|entry| (entry.clone(), CacheLevel::L2))
    }

    /// Writes a value: a dirty entry in L1.
    pub fn set(&self, key: Vec<u8>, value: T) {
        let mut tiers = self.inner.write();
        tiers.l2.pop(&key); // drop a stale L2 copy so it cannot resurface
        tiers.put_l1(key, CacheEntry::dirty(value));
    }

    /// Deletes a value: a dirty tombstone in L1.
    pub fn delete(&self, key: Vec<u8>) {
        let mut tiers = self.inner.write();
        tiers.l2.pop(&key);
        tiers.put_l1(key, CacheEntry::tombstone());
    }

    /// Installs a clean entry from a backing-store read.
    pub fn insert_clean(&self, key: Vec<u8>, value: T) {
        let mut tiers = self.inner.write();
        tiers.l2.pop(&key);
        tiers.put_l1(key, CacheEntry::clean(value));
    }

    /// Empties both levels, dropping dirty entries too. Used to discard an
    /// uncommitted cache after cancellation.
    pub fn clear(&self) {
        let mut tiers = self.inner.write();
        tiers.l1.clear();
        tiers.l2.clear();
    }

    /// The merged dirty set across both levels. L1 wins for keys present in
    /// both. Order is unspecified; the flusher sorts.
    pub fn dirty_entries(&self) -> Vec<(Vec<u8>, CacheEntry<T>)> {
        let tiers = self.inner.read();
        let mut out: Vec<(Vec<u8>, CacheEntry<T>)> = tiers
            .l1
            .iter()
            .filter(|(_, e)| e.dirty)
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect();
        for (key, entry) in tiers.l2.iter() {
            if entry.dirty && tiers.l1.peek(key).is_none() {
                out.push((key.clone(), entry.clone()));
            }
        }
        out
    }

    /// Clears the dirty flag on exactly the given keys, in both levels.
    pub fn clear_dirty_flags(&self, keys: &[Vec<u8>]) {
        let mut tiers = self.inner.write();
        for key in keys {
            if let Some(entry) = tiers.l1.peek_mut(key) {
                entry.dirty = false;
            }
            if let Some(entry) = tiers.l2.peek_mut(key) {
                entry.dirty = false;
            }
        }
    }

    /// The number of entries across both levels.
    pub fn len(&self) -> usize {
        let tiers = self.inner.read();
        tiers.l1.len() + tiers.l2.len()
    }

    /// True when both levels are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cache() -> TieredCache<u64> {
        TieredCache::new(CacheConfig {
            l1_capacity: 2,
            l2_capacity: 2,
        })
    }

    #[test]
    fn set_then_get_hits_l1_dirty() {
        let cache = small_cache();
        cache.set(b"k".to_vec(), 7);
        let (entry, level) = cache.get(b"k").unwrap();
        assert_eq!(level, CacheLevel::L1);
        assert_eq!(entry.value, Some(7));
        assert!(entry.dirty);
        assert!(!entry.deleted);
    }

    #[test]
    fn delete_leaves_a_tombstone() {
        let cache = small_cache();
        cache.set(b"k".to_vec(), 7);
        cache.delete(b"k".to_vec());
        let (entry, _) = cache.get(b"k").unwrap();
        assert!(entry.deleted);
        assert!(entry.dirty);
        assert_eq!(entry.value, None);
    }

    #[test]
    fn l1_eviction_demotes_dirty_entries_to_l2() {
        let cache = small_cache();
        cache.set(b"a".to_vec(), 1);
        cache.set(b"b".to_vec(), 2);
        cache.set(b"c".to_vec(), 3); // evicts "a" (dirty) into L2

        let (entry, level) = cache.get(b"a").unwrap();
        assert_eq!(level, CacheLevel::L2);
        assert_eq!(entry.value, Some(1));
        assert!(entry.dirty, "demotion must preserve the dirty bit");
    }

    #[test]
    fn l2_hit_promotes_to_l1() {
        let cache = small_cache();
        cache.set(b"a".to_vec(), 1);
        cache.set(b"b".to_vec(), 2);
        cache.set(b"c".to_vec(), 3);

        // First get serves from L2 and promotes.
        assert_eq!(cache.get(b"a").unwrap().1, CacheLevel::L2);
        assert_eq!(cache.get(b"a").unwrap().1, CacheLevel::L1);
    }

    #[test]
    fn l2_grows_instead_of_evicting_dirty_entries() {
        let cache = TieredCache::new(CacheConfig {
            l1_capacity: 1,
            l2_capacity: 1,
        });
        // Each new write pushes the previous dirty entry down into L2.
        for (i, key) in [b"a", b"b", b"c", b"d"].iter().enumerate() {
            cache.set(key.to_vec(), i as u64);
        }
        // Nothing dirty was lost.
        let mut dirty = cache.dirty_entries();
        dirty.sort_by(|a, b| a.0.cmp(&b.0));
        let keys: Vec<Vec<u8>> = dirty.into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]
        );
    }

    #[test]
    fn clean_entries_may_be_evicted() {
        let cache = TieredCache::new(CacheConfig {
            l1_capacity: 1,
            l2_capacity: 1,
        });
        cache.insert_clean(b"a".to_vec(), 1);
        cache.insert_clean(b"b".to_vec(), 2);
        cache.insert_clean(b"c".to_vec(), 3);
        // "a" fell out of both levels without growing L2.
        assert!(cache.get(b"a").is_none());
        assert!(cache.dirty_entries().is_empty());
    }

    #[test]
    fn dirty_entries_merge_prefers_l1() {
        let cache = small_cache();
        cache.set(b"a".to_vec(), 1);
        cache.set(b"b".to_vec(), 2);
        cache.set(b"c".to_vec(), 3); // "a" demoted to L2
        cache.set(b"a".to_vec(), 10); // fresh write back into L1

        let dirty = cache.dirty_entries();
        let a_entries: Vec<_> = dirty.iter().filter(|(k, _)| k == b"a").collect();
        assert_eq!(a_entries.len(), 1);
        assert_eq!(a_entries[0].1.value, Some(10));
    }

    #[test]
    fn clear_dirty_flags_targets_exact_keys() {
        let cache = small_cache();
        cache.set(b"a".to_vec(), 1);
        cache.set(b"b".to_vec(), 2);

        cache.clear_dirty_flags(&[b"a".to_vec()]);
        let dirty: Vec<Vec<u8>> = cache.dirty_entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(dirty, vec![b"b".to_vec()]);

        // The cleaned entry still serves reads.
        let (entry, _) = cache.get(b"a").unwrap();
        assert_eq!(entry.value, Some(1));
        assert!(!entry.dirty);
    }

    #[test]
    fn set_drops_stale_l2_copy() {
        let cache = small_cache();
        cache.set(b"a".to_vec(), 1);
        cache.set(b"b".to_vec(), 2);
        cache.set(b"c".to_vec(), 3); // "a" now stale in L2
        cache.set(b"a".to_vec(), 99);

        // Force "a" out of L1 again; the resurfacing entry must be the new one.
        cache.set(b"x".to_vec(), 0);
        cache.set(b"y".to_vec(), 0);
        let (entry, _) = cache.get(b"a").unwrap();
        assert_eq!(entry.value, Some(99));
    }

    #[test]
    fn clear_empties_both_levels() {
        let cache = small_cache();
        cache.set(b"a".to_vec(), 1);
        cache.set(b"b".to_vec(), 2);
        cache.set(b"c".to_vec(), 3);
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(b"a").is_none());
    }
}
