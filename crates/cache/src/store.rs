//! Key/value persistence behind the location cache

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Store failure
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistent key/value store
///
/// `transaction` is the only write that has to be atomic: the updater sees
/// the current value and returns `Some(new)` to replace it or `None` to
/// leave it alone. Under contention the updater may run more than once, so
/// it must not have side effects beyond recording its inputs.
pub trait PersistentStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Atomic read-modify-write, returning the value stored afterwards
    fn transaction(
        &self,
        key: &str,
        update: &mut dyn FnMut(Option<&[u8]>) -> Option<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>>;

    fn flush(&self) -> Result<()>;
}

/// Store backed by a sled database
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open or create a store at the given path
    pub fn open(path: &Path) -> Result<Self> {
        debug!("Opening location store at {}", path.display());
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Store that is removed when dropped
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }
}

impl PersistentStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db.insert(key, value)?;
        Ok(())
    }

    fn transaction(
        &self,
        key: &str,
        update: &mut dyn FnMut(Option<&[u8]>) -> Option<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>> {
        // sled retries the closure on CAS conflict; `None` from the updater
        // must keep the old value rather than delete it
        let stored = self
            .db
            .update_and_fetch(key, |old| update(old).or_else(|| old.map(<[u8]>::to_vec)))?;
        Ok(stored.map(|v| v.to_vec()))
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// In-memory store, used in tests and when no cache path is configured
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn transaction(
        &self,
        key: &str,
        update: &mut dyn FnMut(Option<&[u8]>) -> Option<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>> {
        // The entry holds the shard lock for the whole update
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if let Some(value) = update(Some(entry.get().as_slice())) {
                    entry.insert(value);
                }
                Ok(Some(entry.get().clone()))
            }
            Entry::Vacant(entry) => match update(None) {
                Some(value) => {
                    entry.insert(value.clone());
                    Ok(Some(value))
                }
                None => Ok(None),
            },
        }
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
