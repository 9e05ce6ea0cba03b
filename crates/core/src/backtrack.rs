//! Location transformer
//!
//! Moves a [`Location`] recorded against one snapshot onto another by
//! walking the edits of a [`Delta`]. Each edge of the location is moved
//! independently; an edge whose line falls inside removed text is projected
//! onto the start of the replacement and flagged as deleted.

use crate::delta::{Delta, Edit};
use crate::location::{Location, LocationMeta, Point};
use tracing::debug;

/// A location together with the flags gathered while moving it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transformed {
    pub location: Location,
    pub meta: LocationMeta,
}

impl Transformed {
    /// Start of a transform: the location as recorded, no flags
    pub fn unchanged(location: Location) -> Self {
        Self {
            location,
            meta: LocationMeta::default(),
        }
    }

    /// Fallback when the anchor cannot be placed at all
    pub fn unplaceable() -> Self {
        Self {
            location: Location::EMPTY_FILE,
            meta: LocationMeta::UNPLACEABLE,
        }
    }
}

/// Outcome of moving a single edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MovedPoint {
    point: Point,
    /// Index of the edit that removed the edge's line, if any
    deleted_by: Option<usize>,
}

/// Move one edge through an ordered edit list
fn transform_point(edits: &[Edit], point: Point) -> MovedPoint {
    let Some(line) = point.line else {
        return MovedPoint {
            point,
            deleted_by: None,
        };
    };

    let mut offset: i64 = 0;
    for (index, edit) in edits.iter().enumerate() {
        if edit.removes(line) {
            return MovedPoint {
                point: Point {
                    line: Some(edit.new_start.max(1)),
                    col: point.col.map(|_| 1),
                },
                deleted_by: Some(index),
            };
        }
        // A pure insertion at the point's own line lands before it
        if edit.old_end() <= line {
            offset += edit.line_shift();
            continue;
        }
        break;
    }

    let shifted = (i64::from(line) + offset).max(1);
    MovedPoint {
        point: Point {
            line: Some(u32::try_from(shifted).unwrap_or(u32::MAX)),
            col: point.col,
        },
        deleted_by: None,
    }
}

/// Whether an edit touches the anchored lines `[start, end]`
fn overlaps(edit: &Edit, start: u32, end: u32) -> bool {
    if edit.old_len == 0 {
        // Insertions at `start` push the anchor down without entering it
        edit.old_start > start && edit.old_start <= end
    } else {
        edit.old_start <= end && edit.old_end() > start
    }
}

/// Apply a single delta to a location
///
/// Locations with no line on either edge pass through untouched.
pub fn transform(location: Location, delta: &Delta) -> Transformed {
    if location.is_whole_file() || delta.is_identity() {
        return Transformed::unchanged(location);
    }

    let edits = delta.edits();
    let start = transform_point(edits, location.start());
    let end = transform_point(edits, location.end());

    let span_start = location.start_line.unwrap_or(1);
    let span_end = location.end_line.unwrap_or(u32::MAX);
    let content_changed = edits.iter().any(|e| overlaps(e, span_start, span_end));

    let entirely_deleted = matches!(
        (start.deleted_by, end.deleted_by),
        (Some(a), Some(b)) if a == b
    );

    Transformed {
        location: Location::from_points(start.point, end.point),
        meta: LocationMeta {
            start_was_deleted: start.deleted_by.is_some(),
            end_was_deleted: end.deleted_by.is_some(),
            content_changed,
            entirely_deleted,
        },
    }
}

/// Apply a chain of deltas in order, OR-merging the flags of every stage
pub fn transform_chain<'a>(location: Location, deltas: impl IntoIterator<Item = &'a Delta>) -> Transformed {
    let mut current = Transformed::unchanged(location);
    let mut previous: Option<&Delta> = None;

    for delta in deltas {
        if let Some(prev) = previous {
            if prev.new_ref != delta.old_ref {
                debug!("Delta chain is not contiguous: {} then {}", prev.new_ref, delta.old_ref);
            }
        }
        let stage = transform(current.location, delta);
        current = Transformed {
            location: stage.location,
            meta: current.meta.merge(stage.meta),
        };
        previous = Some(delta);
    }

    current
}

/// Move a location from the new side of a delta back to its old side
pub fn transform_backward(location: Location, delta: &Delta) -> Transformed {
    transform(location, &delta.inverted())
}
