//! Unified diff parsing
//!
//! Turns the output of `git diff <old> <new> -- <path>` into a [`Delta`].
//! Only the first file section is used; the caller always diffs one path.

use crate::delta::{Delta, Edit, SnapshotRef};
use crate::error::{ResolveError, Result};
use tracing::warn;

/// Parse a unified diff into a delta
///
/// An empty patch means the file did not change between the two refs.
pub fn parse_unified_diff(old_ref: SnapshotRef, new_ref: SnapshotRef, patch: &str) -> Result<Delta> {
    let mut edits = Vec::new();
    let mut lines = patch.lines().peekable();
    let mut files_seen = 0;

    while let Some(line) = lines.next() {
        if line.starts_with("diff --git ") {
            files_seen += 1;
            if files_seen > 1 {
                warn!("Patch contains more than one file section, ignoring the rest");
                break;
            }
            continue;
        }

        if line.starts_with("Binary files ") || line.starts_with("GIT binary patch") {
            return Err(ResolveError::binary(format!("{} -> {}", old_ref, new_ref)));
        }

        if !line.starts_with("@@") {
            continue;
        }

        let header = HunkHeader::parse(line)?;
        let mut old_line = header.first_old_line();
        let mut new_line = header.first_new_line();
        let mut old_remaining = header.old_count;
        let mut new_remaining = header.new_count;
        let mut run: Option<Run> = None;

        while old_remaining > 0 || new_remaining > 0 {
            let Some(body) = lines.next() else {
                return Err(malformed("hunk ended early"));
            };

            match body.as_bytes().first() {
                Some(b'-') => {
                    run.get_or_insert(Run::at(old_line, new_line)).old_len += 1;
                    old_line += 1;
                    old_remaining = old_remaining.saturating_sub(1);
                }
                Some(b'+') => {
                    run.get_or_insert(Run::at(old_line, new_line)).new_len += 1;
                    new_line += 1;
                    new_remaining = new_remaining.saturating_sub(1);
                }
                Some(b'\\') => {}
                // Context line; some tools strip the leading space from
                // empty context lines
                Some(b' ') | None => {
                    edits.extend(run.take().and_then(Run::finish));
                    old_line += 1;
                    new_line += 1;
                    old_remaining = old_remaining.saturating_sub(1);
                    new_remaining = new_remaining.saturating_sub(1);
                }
                Some(_) => return Err(malformed(body)),
            }
        }
        edits.extend(run.take().and_then(Run::finish));

        // "\ No newline at end of file" may trail the last hunk line
        while lines.peek().is_some_and(|l| l.starts_with('\\')) {
            lines.next();
        }
    }

    Ok(Delta::new(old_ref, new_ref, edits))
}

fn malformed(detail: &str) -> ResolveError {
    ResolveError::Subprocess {
        message: format!("unparseable diff output: {}", detail),
    }
}

/// A contiguous run of removed and/or added lines
struct Run {
    old_start: u32,
    old_len: u32,
    new_start: u32,
    new_len: u32,
}

impl Run {
    fn at(old_start: u32, new_start: u32) -> Self {
        Self {
            old_start,
            old_len: 0,
            new_start,
            new_len: 0,
        }
    }

    fn finish(self) -> Option<Edit> {
        Edit::new(self.old_start, self.old_len, self.new_start, self.new_len)
    }
}

/// `@@ -old_start[,old_count] +new_start[,new_count] @@`
#[derive(Debug, PartialEq, Eq)]
struct HunkHeader {
    old_start: u32,
    old_count: u32,
    new_start: u32,
    new_count: u32,
}

impl HunkHeader {
    fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        if parts.next() != Some("@@") {
            return Err(malformed(line));
        }
        let old = parts.next().and_then(|p| p.strip_prefix('-'));
        let new = parts.next().and_then(|p| p.strip_prefix('+'));
        let (Some(old), Some(new)) = (old, new) else {
            return Err(malformed(line));
        };
        let (old_start, old_count) = parse_range(old).ok_or_else(|| malformed(line))?;
        let (new_start, new_count) = parse_range(new).ok_or_else(|| malformed(line))?;
        Ok(Self {
            old_start,
            old_count,
            new_start,
            new_count,
        })
    }

    /// An empty side names the line *after which* the change happens
    fn first_old_line(&self) -> u32 {
        if self.old_count == 0 {
            self.old_start + 1
        } else {
            self.old_start
        }
    }

    fn first_new_line(&self) -> u32 {
        if self.new_count == 0 {
            self.new_start + 1
        } else {
            self.new_start
        }
    }
}

fn parse_range(range: &str) -> Option<(u32, u32)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::{diff_text, EditKind};

    fn refs() -> (SnapshotRef, SnapshotRef) {
        (SnapshotRef::commit("c1"), SnapshotRef::commit("c2"))
    }

    const OLD: &str = "line 1\nline 2\nline 3\nline 4\nline 5\nline 6\nline 7\nline 8\nline 9\nline 10\n";
    const NEW: &str = "line 1\nline 2\na\nb\nline 3\nline 4\nline 5\nline 6\nline 8\nnine\nline 10\n";

    const PATCH: &str = "\
diff --git a/f.txt b/f.txt
index 1111111..2222222 100644
--- a/f.txt
+++ b/f.txt
@@ -1,10 +1,11 @@
 line 1
 line 2
+a
+b
 line 3
 line 4
 line 5
 line 6
-line 7
 line 8
-line 9
+nine
 line 10
";

    #[test]
    fn test_parse_context_patch() {
        let (old, new) = refs();
        let delta = parse_unified_diff(old, new, PATCH).unwrap();
        let spans: Vec<_> = delta
            .edits()
            .iter()
            .map(|e| (e.kind, e.old_start, e.old_len, e.new_start, e.new_len))
            .collect();

        assert_eq!(
            spans,
            vec![
                (EditKind::Insert, 3, 0, 3, 2),
                (EditKind::Delete, 7, 1, 9, 0),
                (EditKind::Replace, 9, 1, 10, 1),
            ]
        );
    }

    #[test]
    fn test_patch_agrees_with_local_diff() {
        let (old, new) = refs();
        let parsed = parse_unified_diff(old.clone(), new.clone(), PATCH).unwrap();
        let local = diff_text(old, OLD, new, NEW);
        assert_eq!(parsed, local);
    }

    #[test]
    fn test_zero_context_hunks() {
        let patch = "\
--- a/f.txt
+++ b/f.txt
@@ -5,0 +6,2 @@
+x
+y
@@ -9,2 +10,0 @@
-gone 1
-gone 2
";
        let (old, new) = refs();
        let delta = parse_unified_diff(old, new, patch).unwrap();
        let spans: Vec<_> = delta
            .edits()
            .iter()
            .map(|e| (e.old_start, e.old_len, e.new_start, e.new_len))
            .collect();
        assert_eq!(spans, vec![(6, 0, 6, 2), (9, 2, 11, 0)]);
    }

    #[test]
    fn test_missing_newline_marker() {
        let patch = "\
--- a/f.txt
+++ b/f.txt
@@ -1,2 +1,2 @@
 keep
-old tail
\\ No newline at end of file
+new tail
\\ No newline at end of file
";
        let (old, new) = refs();
        let delta = parse_unified_diff(old, new, patch).unwrap();
        assert_eq!(delta.edits().len(), 1);
        assert_eq!(delta.edits()[0].kind, EditKind::Replace);
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let (old, new) = refs();
        assert!(parse_unified_diff(old, new, "").unwrap().is_identity());
    }

    #[test]
    fn test_binary_patch_rejected() {
        let patch = "diff --git a/img.png b/img.png\nindex 1..2 100644\nBinary files a/img.png and b/img.png differ\n";
        let (old, new) = refs();
        let result = parse_unified_diff(old, new, patch);
        assert!(matches!(result, Err(ResolveError::BinaryContent { .. })));
    }

    #[test]
    fn test_truncated_hunk_is_error() {
        let patch = "@@ -1,3 +1,3 @@\n line\n";
        let (old, new) = refs();
        assert!(parse_unified_diff(old, new, patch).is_err());
    }

    #[test]
    fn test_hunk_header_defaults() {
        let header = HunkHeader::parse("@@ -7 +7,2 @@ fn main()").unwrap();
        assert_eq!(
            header,
            HunkHeader {
                old_start: 7,
                old_count: 1,
                new_start: 7,
                new_count: 2
            }
        );
    }
}
