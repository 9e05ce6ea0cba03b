//! Anchor location model
//!
//! A [`Location`] is the canonical, 1-based flat range an anchor occupies.
//! Any component may be absent, meaning "unbounded" on that edge: a location
//! with no columns covers whole lines, one with no lines covers the whole
//! file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 1-based anchored range `(start_line, start_col, end_line, end_col)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    pub start_line: Option<u32>,
    pub start_col: Option<u32>,
    pub end_line: Option<u32>,
    pub end_col: Option<u32>,
}

/// One edge of a location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub line: Option<u32>,
    pub col: Option<u32>,
}

impl Location {
    /// Sentinel for "no prior position" (new file, no commit yet).
    ///
    /// An empty file has exactly one position, line 1 column 1.
    pub const EMPTY_FILE: Location = Location {
        start_line: Some(1),
        start_col: Some(1),
        end_line: Some(1),
        end_col: Some(1),
    };

    /// Fully bounded location
    pub const fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line: Some(start_line),
            start_col: Some(start_col),
            end_line: Some(end_line),
            end_col: Some(end_col),
        }
    }

    /// Whole-line range, columns unbounded
    pub const fn lines(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line: Some(start_line),
            start_col: None,
            end_line: Some(end_line),
            end_col: None,
        }
    }

    /// Whole-file anchor
    pub const fn whole_file() -> Self {
        Self {
            start_line: None,
            start_col: None,
            end_line: None,
            end_col: None,
        }
    }

    pub fn from_points(start: Point, end: Point) -> Self {
        Self {
            start_line: start.line,
            start_col: start.col,
            end_line: end.line,
            end_col: end.col,
        }
    }

    pub fn start(&self) -> Point {
        Point {
            line: self.start_line,
            col: self.start_col,
        }
    }

    pub fn end(&self) -> Point {
        Point {
            line: self.end_line,
            col: self.end_col,
        }
    }

    pub fn is_empty_file(&self) -> bool {
        *self == Self::EMPTY_FILE
    }

    /// True when neither edge has a line, so no delta can move it
    pub fn is_whole_file(&self) -> bool {
        self.start_line.is_none() && self.end_line.is_none()
    }

    /// Check the ordering invariant
    ///
    /// With both lines present, start must not come after end; on a single
    /// line the same holds for columns. Components are 1-based, so zero is
    /// never valid.
    pub fn is_well_formed(&self) -> bool {
        let components = [self.start_line, self.start_col, self.end_line, self.end_col];
        if components.iter().flatten().any(|&v| v == 0) {
            return false;
        }
        match (self.start_line, self.end_line) {
            (Some(start), Some(end)) if start > end => false,
            (Some(start), Some(end)) if start == end => match (self.start_col, self.end_col) {
                (Some(sc), Some(ec)) => sc <= ec,
                _ => true,
            },
            _ => true,
        }
    }

    /// Flat array form used for persistence
    pub fn to_array(&self) -> [Option<u32>; 4] {
        [self.start_line, self.start_col, self.end_line, self.end_col]
    }

    pub fn from_array(array: [Option<u32>; 4]) -> Self {
        Self {
            start_line: array[0],
            start_col: array[1],
            end_line: array[2],
            end_col: array[3],
        }
    }

    /// Convert to the editor's 0-based range
    pub fn to_editor_range(&self) -> EditorRange {
        EditorRange {
            start: EditorPosition {
                line: EditorCoord::from_one_based(self.start_line, EditorCoord::Start),
                character: EditorCoord::from_one_based(self.start_col, EditorCoord::Start),
            },
            end: EditorPosition {
                line: EditorCoord::from_one_based(self.end_line, EditorCoord::End),
                character: EditorCoord::from_one_based(self.end_col, EditorCoord::End),
            },
        }
    }

    /// Convert from the editor's 0-based range
    pub fn from_editor_range(range: &EditorRange) -> Self {
        Self {
            start_line: range.start.line.to_one_based(),
            start_col: range.start.character.to_one_based(),
            end_line: range.end.line.to_one_based(),
            end_col: range.end.character.to_one_based(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_else(|| "*".to_string());
        write!(
            f,
            "[{}, {}, {}, {}]",
            show(self.start_line),
            show(self.start_col),
            show(self.end_line),
            show(self.end_col)
        )
    }
}

/// Annotations describing how precise a resolved location still is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LocationMeta {
    /// The start edge fell inside removed text
    #[serde(default)]
    pub start_was_deleted: bool,
    /// The end edge fell inside removed text
    #[serde(default)]
    pub end_was_deleted: bool,
    /// Some edit touched the anchored lines themselves
    #[serde(default)]
    pub content_changed: bool,
    /// Both edges were removed by the same edit
    #[serde(default)]
    pub entirely_deleted: bool,
}

impl LocationMeta {
    /// Meta for an anchor that could not be placed at all
    pub const UNPLACEABLE: LocationMeta = LocationMeta {
        start_was_deleted: true,
        end_was_deleted: true,
        content_changed: false,
        entirely_deleted: true,
    };

    /// OR-accumulate flags from a later stage
    ///
    /// Once an edge is ambiguous it stays ambiguous.
    pub fn merge(self, later: LocationMeta) -> LocationMeta {
        LocationMeta {
            start_was_deleted: self.start_was_deleted || later.start_was_deleted,
            end_was_deleted: self.end_was_deleted || later.end_was_deleted,
            content_changed: self.content_changed || later.content_changed,
            entirely_deleted: self.entirely_deleted || later.entirely_deleted,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        self.start_was_deleted || self.end_was_deleted
    }
}

/// 0-based range in editor coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EditorRange {
    pub start: EditorPosition,
    pub end: EditorPosition,
}

/// 0-based position in editor coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EditorPosition {
    pub line: EditorCoord,
    pub character: EditorCoord,
}

/// A single 0-based coordinate, or a document-edge sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorCoord {
    Index(u32),
    /// Start of document (or of line, for a character)
    Start,
    /// End of document (or of line, for a character)
    End,
}

impl EditorCoord {
    fn from_one_based(value: Option<u32>, unbounded: EditorCoord) -> Self {
        match value {
            Some(v) => EditorCoord::Index(v.saturating_sub(1)),
            None => unbounded,
        }
    }

    fn to_one_based(self) -> Option<u32> {
        match self {
            EditorCoord::Index(i) => Some(i + 1),
            EditorCoord::Start | EditorCoord::End => None,
        }
    }

    /// Concrete index given the size of the enclosing dimension
    pub fn resolve(self, len: u32) -> u32 {
        match self {
            EditorCoord::Index(i) => i,
            EditorCoord::Start => 0,
            EditorCoord::End => len,
        }
    }
}

/// Host-IDE conversion target
///
/// Implemented by each editor integration to map [`EditorRange`] onto its
/// own native range type.
pub trait EditorRangeAdapter {
    type Range;

    fn to_native(&self, range: &EditorRange) -> Self::Range;

    fn from_native(&self, range: &Self::Range) -> EditorRange;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_shapes() -> Vec<Location> {
        let mut out = Vec::new();
        for mask in 0u8..16 {
            let pick = |bit: u8, v: u32| if mask & (1 << bit) != 0 { Some(v) } else { None };
            out.push(Location {
                start_line: pick(0, 3),
                start_col: pick(1, 5),
                end_line: pick(2, 7),
                end_col: pick(3, 2),
            });
        }
        out
    }

    #[test]
    fn test_editor_range_roundtrip_every_shape() {
        for location in all_shapes() {
            let range = location.to_editor_range();
            assert_eq!(Location::from_editor_range(&range), location);
        }
    }

    #[test]
    fn test_editor_range_is_zero_based() {
        let range = Location::new(10, 1, 12, 20).to_editor_range();
        assert_eq!(range.start.line, EditorCoord::Index(9));
        assert_eq!(range.start.character, EditorCoord::Index(0));
        assert_eq!(range.end.line, EditorCoord::Index(11));
        assert_eq!(range.end.character, EditorCoord::Index(19));
    }

    #[test]
    fn test_absent_components_map_to_document_edges() {
        let range = Location::whole_file().to_editor_range();
        assert_eq!(range.start.line, EditorCoord::Start);
        assert_eq!(range.end.line, EditorCoord::End);
        assert_eq!(range.end.character.resolve(80), 80);
        assert_eq!(range.start.character.resolve(80), 0);
    }

    #[test]
    fn test_well_formed() {
        assert!(Location::new(1, 1, 1, 1).is_well_formed());
        assert!(Location::new(2, 9, 3, 1).is_well_formed());
        assert!(!Location::new(3, 1, 2, 1).is_well_formed());
        assert!(!Location::new(3, 5, 3, 4).is_well_formed());
        assert!(!Location::new(0, 1, 1, 1).is_well_formed());
        assert!(Location::lines(4, 4).is_well_formed());
        assert!(Location::whole_file().is_well_formed());
    }

    #[test]
    fn test_array_form() {
        let location = Location::lines(3, 8);
        assert_eq!(location.to_array(), [Some(3), None, Some(8), None]);
        assert_eq!(Location::from_array(location.to_array()), location);
    }

    #[test]
    fn test_meta_merge_is_sticky() {
        let first = LocationMeta {
            start_was_deleted: true,
            ..Default::default()
        };
        let merged = first.merge(LocationMeta::default());
        assert!(merged.start_was_deleted);
        assert!(!merged.end_was_deleted);
        assert!(merged.is_ambiguous());
    }

    /// Adapter for an editor whose ranges are plain `(line, character)`
    /// pairs over a document of known shape
    struct FixedDocument {
        line_count: u32,
        line_len: u32,
    }

    impl EditorRangeAdapter for FixedDocument {
        type Range = ((u32, u32), (u32, u32));

        fn to_native(&self, range: &EditorRange) -> Self::Range {
            (
                (range.start.line.resolve(0), range.start.character.resolve(self.line_len)),
                (
                    range.end.line.resolve(self.line_count.saturating_sub(1)),
                    range.end.character.resolve(self.line_len),
                ),
            )
        }

        fn from_native(&self, range: &Self::Range) -> EditorRange {
            let ((sl, sc), (el, ec)) = *range;
            EditorRange {
                start: EditorPosition {
                    line: EditorCoord::Index(sl),
                    character: EditorCoord::Index(sc),
                },
                end: EditorPosition {
                    line: EditorCoord::Index(el),
                    character: EditorCoord::Index(ec),
                },
            }
        }
    }

    #[test]
    fn test_adapter_resolves_sentinels() {
        let doc = FixedDocument {
            line_count: 50,
            line_len: 40,
        };
        let native = doc.to_native(&Location::lines(3, 5).to_editor_range());
        assert_eq!(native, ((2, 0), (4, 40)));

        let back = Location::from_editor_range(&doc.from_native(&native));
        assert_eq!(back, Location::new(3, 1, 5, 41));

        let whole = doc.to_native(&Location::whole_file().to_editor_range());
        assert_eq!(whole, ((0, 0), (49, 40)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Location::lines(2, 4).to_string(), "[2, *, 4, *]");
    }
}
