//! Line-granularity deltas between text snapshots
//!
//! A [`Delta`] is an ordered, normalized list of edits turning an old
//! snapshot into a new one. Line numbers are 1-based. A pure insertion
//! records the old line *before which* the new lines appear, and a pure
//! deletion records the new line that follows the removed span, so every
//! edit has a well-defined position on both sides.

use crate::error::{ResolveError, Result};
use crate::hash::{hash_text, ContentHash};
use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices, Algorithm, DiffTag};
use smallvec::SmallVec;
use std::fmt;

/// How many leading bytes are inspected for NUL when sniffing binary content
const BINARY_SNIFF_LEN: usize = 8192;

/// Identifies one side of a delta
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotRef {
    /// A committed revision
    Commit(String),
    /// The live editor buffer, identified by its content
    Buffer(ContentHash),
}

impl SnapshotRef {
    pub fn commit(hash: impl Into<String>) -> Self {
        SnapshotRef::Commit(hash.into())
    }

    pub fn buffer(text: &str) -> Self {
        SnapshotRef::Buffer(hash_text(text))
    }

    pub fn as_commit(&self) -> Option<&str> {
        match self {
            SnapshotRef::Commit(hash) => Some(hash),
            SnapshotRef::Buffer(_) => None,
        }
    }
}

impl fmt::Display for SnapshotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotRef::Commit(hash) => write!(f, "{}", hash.get(..12).unwrap_or(hash)),
            SnapshotRef::Buffer(hash) => write!(f, "buffer:{}", hash.short()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditKind {
    Insert,
    Delete,
    Replace,
}

/// A single edit operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edit {
    pub kind: EditKind,
    pub old_start: u32,
    pub old_len: u32,
    pub new_start: u32,
    pub new_len: u32,
}

impl Edit {
    /// Build an edit, deriving its kind from the span lengths
    ///
    /// Returns `None` for an edit that changes nothing.
    pub fn new(old_start: u32, old_len: u32, new_start: u32, new_len: u32) -> Option<Self> {
        let kind = match (old_len, new_len) {
            (0, 0) => return None,
            (0, _) => EditKind::Insert,
            (_, 0) => EditKind::Delete,
            _ => EditKind::Replace,
        };
        Some(Self {
            kind,
            old_start,
            old_len,
            new_start,
            new_len,
        })
    }

    /// First old line after the removed span
    pub fn old_end(&self) -> u32 {
        self.old_start + self.old_len
    }

    /// First new line after the inserted span
    pub fn new_end(&self) -> u32 {
        self.new_start + self.new_len
    }

    /// Net change in line count
    pub fn line_shift(&self) -> i64 {
        i64::from(self.new_len) - i64::from(self.old_len)
    }

    /// Whether `line` (old side) lies inside the removed span
    pub fn removes(&self, line: u32) -> bool {
        line >= self.old_start && line < self.old_end()
    }

    fn inverted(&self) -> Self {
        let kind = match self.kind {
            EditKind::Insert => EditKind::Delete,
            EditKind::Delete => EditKind::Insert,
            EditKind::Replace => EditKind::Replace,
        };
        Self {
            kind,
            old_start: self.new_start,
            old_len: self.new_len,
            new_start: self.old_start,
            new_len: self.old_len,
        }
    }
}

/// Ordered, normalized edit list between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub old_ref: SnapshotRef,
    pub new_ref: SnapshotRef,
    edits: SmallVec<[Edit; 8]>,
}

impl Delta {
    /// Create a delta, normalizing the edit list
    ///
    /// Edits are sorted by old position and touching edits are merged, so a
    /// delete run immediately followed by an insert run becomes a replace.
    pub fn new(old_ref: SnapshotRef, new_ref: SnapshotRef, edits: impl IntoIterator<Item = Edit>) -> Self {
        let mut sorted: SmallVec<[Edit; 8]> = edits.into_iter().collect();
        sorted.sort_by_key(|e| (e.old_start, e.new_start));

        let mut normalized: SmallVec<[Edit; 8]> = SmallVec::with_capacity(sorted.len());
        for edit in sorted {
            if let Some(last) = normalized.last_mut() {
                if last.old_end() == edit.old_start && last.new_end() == edit.new_start {
                    let merged = Edit::new(
                        last.old_start,
                        last.old_len + edit.old_len,
                        last.new_start,
                        last.new_len + edit.new_len,
                    );
                    if let Some(merged) = merged {
                        *last = merged;
                    }
                    continue;
                }
            }
            normalized.push(edit);
        }

        Self {
            old_ref,
            new_ref,
            edits: normalized,
        }
    }

    /// Delta between two identical snapshots
    pub fn identity(old_ref: SnapshotRef, new_ref: SnapshotRef) -> Self {
        Self {
            old_ref,
            new_ref,
            edits: SmallVec::new(),
        }
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    pub fn is_identity(&self) -> bool {
        self.edits.is_empty()
    }

    /// The same change seen from the other side (new becomes old)
    pub fn inverted(&self) -> Delta {
        Delta {
            old_ref: self.new_ref.clone(),
            new_ref: self.old_ref.clone(),
            edits: self.edits.iter().map(Edit::inverted).collect(),
        }
    }

    /// Total lines removed and added
    pub fn stats(&self) -> (u32, u32) {
        self.edits
            .iter()
            .fold((0, 0), |(del, add), e| (del + e.old_len, add + e.new_len))
    }
}

/// Split text into lines, accepting LF, CRLF and lone CR terminators
///
/// A trailing terminator does not produce an extra empty line, so
/// `"a\nb\n"` and `"a\r\nb"` split identically.
pub fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                i += 1;
                if i < bytes.len() && bytes[i] == b'\n' {
                    i += 1;
                }
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < bytes.len() {
        lines.push(&text[start..]);
    }

    lines
}

/// Check if content is binary (contains null bytes in first 8KB)
pub fn is_binary(content: &[u8]) -> bool {
    content.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0)
}

/// Decode a snapshot as text, rejecting binary content
pub fn decode_snapshot<'a>(content: &'a [u8], what: &SnapshotRef) -> Result<&'a str> {
    if is_binary(content) {
        return Err(ResolveError::binary(what.to_string()));
    }
    std::str::from_utf8(content).map_err(|_| ResolveError::binary(what.to_string()))
}

/// Diff two text snapshots
pub fn diff_text(old_ref: SnapshotRef, old: &str, new_ref: SnapshotRef, new: &str) -> Delta {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);

    let ops = capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines);
    let edits = ops.iter().filter_map(|op| {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            return None;
        }
        Edit::new(
            old_range.start as u32 + 1,
            old_range.len() as u32,
            new_range.start as u32 + 1,
            new_range.len() as u32,
        )
    });

    let delta = Delta::new(old_ref, new_ref, edits);
    tracing::trace!(
        "diffed {} -> {}: {} edits",
        delta.old_ref,
        delta.new_ref,
        delta.edits().len()
    );
    delta
}

/// Diff two raw snapshots
///
/// Both sides must decode as text; binary content yields
/// [`ResolveError::BinaryContent`] and no delta.
pub fn build_delta(old_ref: SnapshotRef, old: &[u8], new_ref: SnapshotRef, new: &[u8]) -> Result<Delta> {
    let old_text = decode_snapshot(old, &old_ref)?;
    let new_text = decode_snapshot(new, &new_ref)?;
    Ok(diff_text(old_ref, old_text, new_ref, new_text))
}
