//! Committed and dirty anchor locations
//!
//! Committed locations are the ground truth for a `(commit, stream)` pair.
//! They are written once per marker and never changed afterwards, so
//! concurrent resolutions of the same marker all converge on the first
//! write. Dirty locations track the live buffer and are overwritten freely;
//! they only ever live in memory.

use crate::store::{PersistentStore, Result, StoreError};
use anchor_core::{Location, LocationMeta, Transformed};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Persisted form: marker id to `[start_line, start_col, end_line, end_col]`
/// and the flags gathered while placing it
type EncodedLocations = BTreeMap<String, ([Option<u32>; 4], LocationMeta)>;

/// Locations known for one `(commit, stream)` pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    /// Authoritative positions at the commit with their flags, keyed by
    /// marker id
    pub locations: BTreeMap<String, Transformed>,
    /// Speculative positions in the live buffer, keyed by marker id
    pub dirty: BTreeMap<String, Location>,
}

impl CacheEntry {
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty() && self.dirty.is_empty()
    }
}

/// Location cache over a persistent store
pub struct LocationCache {
    store: Arc<dyn PersistentStore>,
    /// (stream id, commit hash) -> marker id -> location
    dirty: DashMap<(String, String), BTreeMap<String, Location>>,
}

impl LocationCache {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self {
            store,
            dirty: DashMap::new(),
        }
    }

    fn committed_key(commit: &str, stream: &str) -> String {
        format!("loc/{}/{}", stream, commit)
    }

    fn decode(bytes: &[u8]) -> std::result::Result<EncodedLocations, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Everything known for a `(commit, stream)` pair
    pub fn get(&self, commit: &str, stream: &str) -> Result<Option<CacheEntry>> {
        let locations = match self.store.get(&Self::committed_key(commit, stream))? {
            Some(bytes) => Self::decode(&bytes)?
                .into_iter()
                .map(|(marker, (array, meta))| {
                    let placed = Transformed {
                        location: Location::from_array(array),
                        meta,
                    };
                    (marker, placed)
                })
                .collect(),
            None => BTreeMap::new(),
        };

        let dirty = self
            .dirty
            .get(&(stream.to_string(), commit.to_string()))
            .map(|m| m.value().clone())
            .unwrap_or_default();

        let entry = CacheEntry { locations, dirty };
        Ok((!entry.is_empty()).then_some(entry))
    }

    /// Committed location of a single marker, with the flags it was stored with
    pub fn committed(&self, commit: &str, stream: &str, marker: &str) -> Result<Option<Transformed>> {
        Ok(self
            .get(commit, stream)?
            .and_then(|mut entry| entry.locations.remove(marker)))
    }

    /// Record a marker's position at a commit, unless one is already recorded
    ///
    /// Returns what is persisted: `placed` if this call won, otherwise the
    /// earlier value, which is left untouched. The flags are stored with the
    /// location so later reads report the same precision.
    pub fn put_committed(&self, commit: &str, stream: &str, marker: &str, placed: Transformed) -> Result<Transformed> {
        let key = Self::committed_key(commit, stream);
        let mut winner = placed;
        let mut failure: Option<serde_json::Error> = None;

        self.store.transaction(&key, &mut |current| {
            failure = None;
            let mut map = match current.map(Self::decode).transpose() {
                Ok(map) => map.unwrap_or_default(),
                Err(e) => {
                    failure = Some(e);
                    return None;
                }
            };

            if let Some((array, meta)) = map.get(marker) {
                winner = Transformed {
                    location: Location::from_array(*array),
                    meta: *meta,
                };
                return None;
            }

            winner = placed;
            map.insert(marker.to_string(), (placed.location.to_array(), placed.meta));
            match serde_json::to_vec(&map) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    failure = Some(e);
                    None
                }
            }
        })?;

        if let Some(e) = failure {
            return Err(StoreError::Encoding(e));
        }

        trace!("Committed location for {} at {}: {}", marker, commit, winner.location);
        Ok(winner)
    }

    /// Record a marker's position in the live buffer, replacing any earlier one
    pub fn put_dirty(&self, commit: &str, stream: &str, marker: &str, location: Location) {
        self.dirty
            .entry((stream.to_string(), commit.to_string()))
            .or_default()
            .insert(marker.to_string(), location);
    }

    /// Drop every dirty location recorded for a stream
    pub fn invalidate_dirty(&self, stream: &str) {
        let before = self.dirty.len();
        self.dirty.retain(|(s, _), _| s != stream);
        debug!(
            "Invalidated dirty locations for stream {} ({} entries)",
            stream,
            before.saturating_sub(self.dirty.len())
        );
    }

    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }
}
