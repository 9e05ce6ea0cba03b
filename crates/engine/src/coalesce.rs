//! In-flight request coalescing
//!
//! Concurrent callers asking for the same key share one computation. The
//! entry is dropped once the computation finishes, so later callers start
//! fresh; results are cached elsewhere.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct Coalescer<K, V> {
    inflight: DashMap<K, (u64, Shared<BoxFuture<'static, V>>)>,
    next_id: AtomicU64,
}

impl<K, V> Default for Coalescer<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            inflight: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<K, V> Coalescer<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Await the computation for `key`, starting it with `start` if none is
    /// in flight
    pub async fn run<F, Fut>(&self, key: K, start: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (id, shared) = match self.inflight.entry(key.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let shared = start().boxed().shared();
                entry.insert((id, shared.clone()));
                (id, shared)
            }
        };

        let value = shared.await;
        self.inflight.remove_if(&key, |_, (current, _)| *current == id);
        value
    }

    /// Number of computations currently in flight
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }
}
