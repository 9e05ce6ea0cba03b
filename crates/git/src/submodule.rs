//! Submodule routing
//!
//! A file inside a submodule has to be blamed by git running in that
//! submodule, with a path relative to it. [`SubmoduleTable`] picks the right
//! [`RepositoryContext`] for a file once, by component-wise prefix match
//! against the known submodule paths, most specific first.

use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Where git commands for a file should run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryContext {
    /// Working directory for git invocations
    pub root: PathBuf,
    /// Submodule path relative to the top-level repository, `None` for the
    /// top-level repository itself
    pub submodule: Option<String>,
}

impl RepositoryContext {
    pub fn root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            submodule: None,
        }
    }

    pub fn is_submodule(&self) -> bool {
        self.submodule.is_some()
    }
}

/// Submodule contexts of one repository, sorted most specific first
#[derive(Debug, Clone)]
pub struct SubmoduleTable {
    root: RepositoryContext,
    /// (relative path, context), deepest paths first
    submodules: Vec<(PathBuf, RepositoryContext)>,
}

/// Join path components with `/` for git
fn to_git_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

impl SubmoduleTable {
    pub fn new<I, S>(repo_root: impl Into<PathBuf>, submodule_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let repo_root = repo_root.into();
        let mut submodules: Vec<(PathBuf, RepositoryContext)> = submodule_paths
            .into_iter()
            .map(|p| PathBuf::from(p.as_ref().trim_end_matches('/')))
            .filter(|p| p.components().next().is_some())
            .map(|relative| {
                let context = RepositoryContext {
                    root: repo_root.join(&relative),
                    submodule: Some(to_git_path(&relative)),
                };
                (relative, context)
            })
            .collect();

        submodules.sort_by(|(a, _), (b, _)| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });
        submodules.dedup_by(|(a, _), (b, _)| a == b);

        Self {
            root: RepositoryContext::root(repo_root),
            submodules,
        }
    }

    /// Table with no submodules
    pub fn root_only(repo_root: impl Into<PathBuf>) -> Self {
        Self::new(repo_root, std::iter::empty::<&str>())
    }

    pub fn repo_root(&self) -> &Path {
        &self.root.root
    }

    pub fn len(&self) -> usize {
        self.submodules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submodules.is_empty()
    }

    /// Pick the context for a file and its path relative to that context
    ///
    /// Absolute paths are first made relative to the repository root.
    pub fn resolve(&self, file_path: &Path) -> (&RepositoryContext, String) {
        let relative = if file_path.is_absolute() {
            match file_path.strip_prefix(&self.root.root) {
                Ok(rel) => rel,
                Err(_) => {
                    debug!(
                        "{} is outside {}, routing to the root context",
                        file_path.display(),
                        self.root.root.display()
                    );
                    file_path
                }
            }
        } else {
            file_path
        };

        for (prefix, context) in &self.submodules {
            if let Ok(inner) = relative.strip_prefix(prefix) {
                return (context, to_git_path(inner));
            }
        }

        (&self.root, to_git_path(relative))
    }
}
