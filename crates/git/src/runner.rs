//! Version control seam
//!
//! Everything the engine needs from version control goes through
//! [`VersionControlRunner`], so tests can swap in an in-memory history.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Placeholder commit git blame reports for lines not yet committed
pub const UNCOMMITTED_SHA: &str = "0000000000000000000000000000000000000000";

/// Inclusive, 1-based line range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }
}

/// Attribution of one line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlameLine {
    /// Line number in the blamed content
    pub line: u32,
    pub commit: String,
    pub author_email: String,
}

impl BlameLine {
    pub fn is_uncommitted(&self) -> bool {
        self.commit.bytes().all(|b| b == b'0')
    }
}

/// What to blame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlameOptions {
    /// Blame as of this revision instead of the working tree
    pub revision: Option<String>,
    pub range: Option<LineRange>,
    /// Live buffer text to blame instead of the file on disk
    pub contents: Option<String>,
}

/// Operations the engine runs against version control
///
/// Paths are relative to `repo_root`. Failures distinguish a missing
/// revision, an untracked path and binary content from other subprocess
/// failures.
#[async_trait]
pub trait VersionControlRunner: Send + Sync {
    /// Text of `path` as of `revision`
    async fn read_file_at_revision(&self, repo_root: &Path, path: &str, revision: &str) -> Result<String>;

    /// Per-line attribution, restricted to `options.range` when given
    async fn blame(&self, repo_root: &Path, path: &str, options: &BlameOptions) -> Result<Vec<BlameLine>>;

    /// Raw unified diff of `path` between two revisions
    async fn diff_revisions(&self, repo_root: &Path, old: &str, new: &str, path: &str) -> Result<String>;

    /// Full hash of HEAD
    async fn current_revision(&self, repo_root: &Path) -> Result<String>;

    /// Submodule paths relative to `repo_root`
    async fn list_submodules(&self, repo_root: &Path) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_range_orders_bounds() {
        assert_eq!(LineRange::new(9, 4), LineRange { start: 4, end: 9 });
    }

    #[test]
    fn test_uncommitted_detection() {
        let line = BlameLine {
            line: 1,
            commit: UNCOMMITTED_SHA.to_string(),
            author_email: "not.committed.yet".to_string(),
        };
        assert!(line.is_uncommitted());

        let line = BlameLine {
            commit: "0a1b2c".to_string(),
            ..line
        };
        assert!(!line.is_uncommitted());
    }
}
