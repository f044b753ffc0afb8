//! Memo of `Types()` results keyed by component-id set

use crate::component_set::ComponentIdSet;
use std::collections::{HashMap, VecDeque};

/// Bounded memo for archetype resolution. Evicts in insertion order.
///
/// A capacity of zero disables caching.
pub struct ArchetypeCache<V> {
    entries: HashMap<ComponentIdSet, V>,
    order: VecDeque<ComponentIdSet>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl<V: Clone> ArchetypeCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
            hits: 0,
            misses: 0,
        }
    }

    /// Cached value for `key`, computing and storing it on a miss.
    pub fn get_or_insert_with(&mut self, key: &ComponentIdSet, compute: impl FnOnce() -> V) -> V {
        if let Some(value) = self.entries.get(key) {
            self.hits += 1;
            return value.clone();
        }
        self.misses += 1;
        let value = compute();
        if self.capacity == 0 {
            return value;
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key.clone(), value.clone());
        value
    }

    pub fn contains(&self, key: &ComponentIdSet) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// (hits, misses) since construction.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[i32]) -> ComponentIdSet {
        ids.iter().copied().collect()
    }

    #[test]
    fn repeated_keys_hit() {
        let mut cache = ArchetypeCache::new(4);
        assert_eq!(cache.get_or_insert_with(&set(&[1, 2]), || 7), 7);
        assert_eq!(cache.get_or_insert_with(&set(&[2, 1]), || unreachable!()), 7);
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn oldest_entry_is_evicted_first() {
        let mut cache = ArchetypeCache::new(2);
        cache.get_or_insert_with(&set(&[1]), || 1);
        cache.get_or_insert_with(&set(&[2]), || 2);
        cache.get_or_insert_with(&set(&[3]), || 3);

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&set(&[1])));
        assert!(cache.contains(&set(&[2])));
        assert!(cache.contains(&set(&[3])));
    }

    #[test]
    fn zero_capacity_never_stores() {
        let mut cache = ArchetypeCache::new(0);
        cache.get_or_insert_with(&set(&[1]), || 1);
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_insert_with(&set(&[1]), || 2), 2);
    }
}
