//! Git runner error types

use anchor_core::ResolveError;
use thiserror::Error;

/// Errors raised while running git
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GitError {
    #[error("revision not found: {revision}")]
    RevisionNotFound { revision: String },

    #[error("path not tracked: {path}")]
    PathNotTracked { path: String },

    #[error("binary content: {path}")]
    BinaryContent { path: String },

    #[error("git {command} timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    Failed { command: String, stderr: String },
}

pub type Result<T> = std::result::Result<T, GitError>;

/// stderr fragments that mean the revision does not exist
const UNKNOWN_REVISION: &[&str] = &[
    "unknown revision",
    "bad revision",
    "invalid object name",
    "not a valid object name",
    "bad object",
    "does not have any commits",
];

/// stderr fragments that mean git does not know the path
const UNKNOWN_PATH: &[&str] = &[
    "does not exist in",
    "exists on disk, but not in",
    "no such path",
    "is outside repository",
];

impl GitError {
    /// Classify a failed invocation from its stderr
    pub fn classify(command: &str, stderr: &str, revision: Option<&str>, path: Option<&str>) -> Self {
        let lowered = stderr.to_lowercase();

        if let Some(path) = path {
            if UNKNOWN_PATH.iter().any(|p| lowered.contains(p)) {
                return GitError::PathNotTracked { path: path.to_string() };
            }
        }
        if UNKNOWN_REVISION.iter().any(|p| lowered.contains(p)) {
            return GitError::RevisionNotFound {
                revision: revision.unwrap_or("HEAD").to_string(),
            };
        }

        GitError::Failed {
            command: command.to_string(),
            stderr: stderr.trim().to_string(),
        }
    }
}

impl From<GitError> for ResolveError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::RevisionNotFound { revision } => ResolveError::RevisionUnavailable { revision },
            GitError::PathNotTracked { path } => ResolveError::UntrackedPath { path },
            GitError::BinaryContent { path } => ResolveError::BinaryContent { what: path },
            other => ResolveError::Subprocess {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_revision() {
        let err = GitError::classify(
            "show",
            "fatal: invalid object name 'deadbeef'.",
            Some("deadbeef"),
            Some("src/lib.rs"),
        );
        assert!(matches!(err, GitError::RevisionNotFound { ref revision } if revision == "deadbeef"));
    }

    #[test]
    fn test_classify_path() {
        let err = GitError::classify(
            "show",
            "fatal: path 'src/gone.rs' does not exist in 'HEAD'",
            Some("HEAD"),
            Some("src/gone.rs"),
        );
        assert!(matches!(err, GitError::PathNotTracked { .. }));

        let err = GitError::classify("blame", "fatal: no such path 'new.rs' in HEAD", None, Some("new.rs"));
        assert!(matches!(err, GitError::PathNotTracked { .. }));
    }

    #[test]
    fn test_classify_other() {
        let err = GitError::classify("diff", "fatal: not a git repository", None, None);
        assert!(matches!(err, GitError::Failed { .. }));
    }

    #[test]
    fn test_into_resolve_error() {
        let err: ResolveError = GitError::RevisionNotFound {
            revision: "abc".to_string(),
        }
        .into();
        assert!(err.is_missing_revision());

        let err: ResolveError = GitError::Timeout {
            command: "blame".to_string(),
            timeout_ms: 10,
        }
        .into();
        assert!(matches!(err, ResolveError::Subprocess { .. }));
    }
}
