//! Shrinking Map
//!
//! Long-running nodes subscribe and unsubscribe constantly. A plain hash map
//! keeps its peak capacity forever, so a registry that once held a million
//! callbacks keeps the memory for a million callbacks. `ShrinkingMap` counts
//! deletions and compacts the backing storage once enough have accumulated.

use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;

use indexmap::IndexMap;

/// Number of deletions after which the map compacts itself.
const DEFAULT_SHRINKING_THRESHOLD: usize = 1_000;

/// A map that shrinks its capacity after many deletions.
///
/// Entries iterate in insertion order until the first removal; removing a key
/// moves the last entry into its slot.
pub struct ShrinkingMap<K, V> {
    map: IndexMap<K, V>,

    /// Deletions since the last compaction.
    deleted_keys: usize,

    /// Compaction happens once `deleted_keys` reaches this value.
    shrinking_threshold: usize,
}

impl<K, V> ShrinkingMap<K, V>
where
    K: Hash + Eq,
{
    /// Create an empty map with the default shrinking threshold.
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_SHRINKING_THRESHOLD)
    }

    /// Create an empty map that compacts after `threshold` deletions.
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            map: IndexMap::new(),
            deleted_keys: 0,
            shrinking_threshold: threshold.max(1),
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get_mut(key)
    }

    /// Insert a value, returning the previous value for the key if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.map.insert(key, value)
    }

    /// Remove a key in constant time. The last entry takes the removed slot.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.map.swap_remove(key);
        if removed.is_some() {
            self.deleted_keys += 1;
            self.shrink_if_needed();
        }
        removed
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate entries in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.map.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.map.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.map.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.map.values_mut()
    }

    /// Visit entries in storage order until `f` returns `false`.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        for (key, value) in &self.map {
            if !f(key, value) {
                break;
            }
        }
    }

    /// Remove every entry and return them in storage order.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        self.deleted_keys = 0;
        let drained = self.map.drain(..).collect();
        self.map.shrink_to_fit();
        drained
    }

    /// Current allocated capacity, exposed for tests and diagnostics.
    pub fn capacity(&self) -> usize {
        self.map.capacity()
    }

    fn shrink_if_needed(&mut self) {
        if self.deleted_keys >= self.shrinking_threshold {
            self.map.shrink_to_fit();
            self.deleted_keys = 0;
        }
    }
}

impl<K, V> Default for ShrinkingMap<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Debug for ShrinkingMap<K, V>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.map.iter()).finish()
    }
}
