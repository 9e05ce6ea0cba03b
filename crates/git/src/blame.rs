//! Authorship attribution via git blame

use crate::runner::{BlameLine, BlameOptions, LineRange, VersionControlRunner};
use crate::submodule::SubmoduleTable;
use ahash::{AHashMap, AHashSet};
use dashmap::DashMap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Distinct author emails, in order of first appearance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AuthorSet {
    emails: Vec<String>,
}

impl AuthorSet {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.emails.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.emails
    }
}

impl FromIterator<String> for AuthorSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut seen = AHashSet::new();
        let emails = iter.into_iter().filter(|e| seen.insert(e.clone())).collect();
        Self { emails }
    }
}

/// Authors of committed lines, uncommitted lines skipped
pub fn collect_authors(lines: &[BlameLine]) -> AuthorSet {
    lines
        .iter()
        .filter(|l| !l.is_uncommitted())
        .map(|l| l.author_email.clone())
        .collect()
}

fn is_header(line: &str) -> Option<(&str, u32)> {
    let mut parts = line.split(' ');
    let sha = parts.next()?;
    if !(sha.len() == 40 || sha.len() == 64) || !sha.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let _original: u32 = parts.next()?.parse().ok()?;
    let final_line: u32 = parts.next()?.parse().ok()?;
    Some((sha, final_line))
}

/// Parse `git blame --porcelain` output
///
/// Commit details are printed only the first time a commit appears, so
/// author emails are remembered per commit.
pub fn parse_porcelain(output: &str) -> Vec<BlameLine> {
    let mut emails: AHashMap<&str, &str> = AHashMap::new();
    let mut current: Option<(&str, u32)> = None;
    let mut lines = Vec::new();

    for line in output.lines() {
        if line.starts_with('\t') {
            if let Some((sha, final_line)) = current.take() {
                lines.push(BlameLine {
                    line: final_line,
                    commit: sha.to_string(),
                    author_email: emails.get(sha).copied().unwrap_or_default().to_string(),
                });
            }
        } else if let Some(mail) = line.strip_prefix("author-mail ") {
            if let Some((sha, _)) = current {
                let mail = mail.trim().trim_start_matches('<').trim_end_matches('>');
                emails.insert(sha, mail);
            }
        } else if let Some(header) = is_header(line) {
            current = Some(header);
        }
    }

    lines
}

/// Resolves authors of line ranges, routing through submodules
pub struct BlameResolver {
    runner: Arc<dyn VersionControlRunner>,
    tables: DashMap<PathBuf, Arc<SubmoduleTable>>,
}

impl BlameResolver {
    pub fn new(runner: Arc<dyn VersionControlRunner>) -> Self {
        Self {
            runner,
            tables: DashMap::new(),
        }
    }

    /// Install a submodule table for a repository, replacing any earlier one
    pub fn register(&self, table: SubmoduleTable) -> Arc<SubmoduleTable> {
        let table = Arc::new(table);
        self.tables
            .insert(table.repo_root().to_path_buf(), Arc::clone(&table));
        table
    }

    /// Submodule table for a repository, discovering it on first use
    ///
    /// A failed discovery yields a root-only table so blame still works for
    /// files outside submodules.
    pub async fn discover(&self, repo_root: &Path) -> Arc<SubmoduleTable> {
        if let Some(table) = self.tables.get(repo_root) {
            return Arc::clone(table.value());
        }

        let table = match self.runner.list_submodules(repo_root).await {
            Ok(paths) => {
                debug!("Found {} submodules in {}", paths.len(), repo_root.display());
                SubmoduleTable::new(repo_root, paths)
            }
            Err(e) => {
                warn!("Submodule discovery failed in {}: {}", repo_root.display(), e);
                SubmoduleTable::root_only(repo_root)
            }
        };
        self.register(table)
    }

    /// Authors of `range` in `file_path`
    ///
    /// `contents` blames the live buffer instead of the file on disk. Any
    /// failure yields an empty set.
    pub async fn authors(
        &self,
        repo_root: &Path,
        file_path: &Path,
        range: LineRange,
        contents: Option<&str>,
    ) -> AuthorSet {
        let table = self.discover(repo_root).await;
        let (context, relative) = table.resolve(file_path);

        let options = BlameOptions {
            revision: None,
            range: Some(range),
            contents: contents.map(str::to_string),
        };

        match self.runner.blame(&context.root, &relative, &options).await {
            Ok(lines) => collect_authors(&lines),
            Err(e) => {
                warn!("Blame failed for {}: {}", file_path.display(), e);
                AuthorSet::default()
            }
        }
    }
}
