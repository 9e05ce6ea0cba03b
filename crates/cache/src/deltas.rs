//! Bounded cache of built deltas
//!
//! Keyed by the `(old, new)` snapshot pair of a file. Commit refs name a
//! whole tree, so the file path is part of the key. When full, the oldest
//! inserted delta is evicted first.

use anchor_core::{Delta, SnapshotRef};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

type DeltaKey = (String, SnapshotRef, SnapshotRef);

pub struct DeltaCache {
    capacity: usize,
    deltas: DashMap<DeltaKey, Arc<Delta>>,
    /// Insertion order, oldest first
    order: Mutex<VecDeque<DeltaKey>>,
}

impl DeltaCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            deltas: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
        }
    }

    pub fn get(&self, path: &str, old: &SnapshotRef, new: &SnapshotRef) -> Option<Arc<Delta>> {
        self.deltas
            .get(&(path.to_string(), old.clone(), new.clone()))
            .map(|d| Arc::clone(d.value()))
    }

    /// Insert a delta, returning the cached instance
    ///
    /// If a delta for the same pair is already cached it is kept and
    /// returned instead.
    pub fn insert(&self, path: &str, delta: Delta) -> Arc<Delta> {
        let key = (path.to_string(), delta.old_ref.clone(), delta.new_ref.clone());
        let mut order = self.order.lock();

        if let Some(existing) = self.deltas.get(&key) {
            return Arc::clone(existing.value());
        }

        let delta = Arc::new(delta);
        self.deltas.insert(key.clone(), Arc::clone(&delta));
        order.push_back(key);

        while order.len() > self.capacity {
            if let Some(evicted) = order.pop_front() {
                trace!("Evicting delta {} {} -> {}", evicted.0, evicted.1, evicted.2);
                self.deltas.remove(&evicted);
            }
        }

        delta
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        let mut order = self.order.lock();
        order.clear();
        self.deltas.clear();
    }
}
