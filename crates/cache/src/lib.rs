//! Anchor location and delta caching
//!
//! This crate provides:
//! - The `PersistentStore` seam with sled and in-memory implementations
//! - Committed (write-once) and dirty (in-memory) location caching
//! - A bounded cache of built deltas

pub mod deltas;
pub mod locations;
pub mod store;

// Re-exports
pub use deltas::DeltaCache;
pub use locations::{CacheEntry, LocationCache};
pub use store::{MemoryStore, PersistentStore, Result, SledStore, StoreError};
