//! Core anchor model and algorithms
//!
//! This crate provides:
//! - The 1-based location model and editor range conversion
//! - BLAKE3 content hashes identifying working-buffer snapshots
//! - Line-granularity deltas (Myers diff) and unified patch parsing
//! - The location transformer that moves anchors through deltas

pub mod backtrack;
pub mod delta;
pub mod error;
pub mod hash;
pub mod location;
pub mod patch;

// Re-exports
pub use backtrack::{transform, transform_backward, transform_chain, Transformed};
pub use delta::{build_delta, diff_text, Delta, Edit, EditKind, SnapshotRef};
pub use error::{ResolveError, Result};
pub use hash::{hash_text, ContentHash};
pub use location::{EditorCoord, EditorPosition, EditorRange, EditorRangeAdapter, Location, LocationMeta, Point};
pub use patch::parse_unified_diff;
