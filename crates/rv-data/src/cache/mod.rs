//! Sorted-permutation cache.
//!
//! Sorting the whole table is the expensive part of every request; views
//! page through the same order many times, so permutations are kept per
//! sort key.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use rv_core::order::RecordOrder;

/// Column names and directions; two orders with the same key sort identically
type SortKey = Vec<(String, bool)>;

fn sort_key(order: &RecordOrder) -> SortKey {
    order
        .entries()
        .iter()
        .map(|e| (e.name().to_string(), e.is_ascending))
        .collect()
}

/// Cache of row permutations indexed by sort order
pub struct SortCache {
    entries: RwLock<AHashMap<SortKey, Arc<Vec<usize>>>>,
    /// Maximum number of permutations to keep
    max_entries: usize,
}

impl SortCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(AHashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&self, order: &RecordOrder) -> Option<Arc<Vec<usize>>> {
        self.entries.read().get(&sort_key(order)).cloned()
    }

    pub fn put(&self, order: &RecordOrder, permutation: Arc<Vec<usize>>) {
        let key = sort_key(order);
        let mut entries = self.entries.write();
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            // Evict an arbitrary entry
            if let Some(victim) = entries.keys().next().cloned() {
                entries.remove(&victim);
            }
        }
        entries.insert(key, permutation);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl Default for SortCache {
    fn default() -> Self {
        Self::new(16)
    }
}
