//! Key Cache
//!
//! Bounded LRU map from decorated key to the data-file offset of its
//! record, shared by every thread reading a segment.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::partitioner::DecoratedKey;

/// Least-recently-used cache of record positions
///
/// ## Concurrency:
/// - `inner`: Protected by Mutex (lookups reorder recency, so even reads mutate)
/// - `hits` / `misses`: Atomic counters (lock-free)
#[derive(Debug)]
pub struct KeyCache {
    capacity: usize,
    inner: Mutex<Inner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Default)]
struct Inner {
    /// key → (position, last access tick)
    entries: HashMap<DecoratedKey, (u64, u64)>,
    /// last access tick → key, oldest first
    recency: BTreeMap<u64, DecoratedKey>,
    tick: u64,
}

impl Inner {
    fn touch(&mut self, key: &DecoratedKey) -> Option<u64> {
        self.tick += 1;
        let tick = self.tick;
        let (position, last) = self.entries.get_mut(key)?;
        let previous = std::mem::replace(last, tick);
        let position = *position;
        if let Some(k) = self.recency.remove(&previous) {
            self.recency.insert(tick, k);
        }
        Some(position)
    }
}

impl KeyCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &DecoratedKey) -> Option<u64> {
        let found = self.inner.lock().touch(key);
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, key: DecoratedKey, position: u64) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.touch(&key).is_some() {
            if let Some(entry) = inner.entries.get_mut(&key) {
                entry.0 = position;
            }
            return;
        }

        while inner.entries.len() >= self.capacity {
            let Some((_, oldest)) = inner.recency.pop_first() else {
                break;
            };
            inner.entries.remove(&oldest);
        }

        inner.tick += 1;
        let tick = inner.tick;
        inner.recency.insert(tick, key.clone());
        inner.entries.insert(key, (position, tick));
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
