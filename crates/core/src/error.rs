//! Resolution error taxonomy
//!
//! Every failure the engine can hit while resolving an anchor is one of
//! these. None of them escape the engine boundary: the resolver turns them
//! into the unplaceable fallback location.

use thiserror::Error;

/// Typed resolution failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Diffing was requested on non-text content
    #[error("binary content cannot be diffed: {what}")]
    BinaryContent { what: String },

    /// A commit referenced by an anchor cannot be read
    #[error("revision {revision} is not available")]
    RevisionUnavailable { revision: String },

    /// Blame or diff was requested for a path git does not track
    #[error("path {path} is not tracked")]
    UntrackedPath { path: String },

    /// The underlying git invocation failed or timed out
    #[error("git subprocess failed: {message}")]
    Subprocess { message: String },
}

impl ResolveError {
    /// Convenience constructor for binary snapshots
    pub fn binary(what: impl Into<String>) -> Self {
        Self::BinaryContent { what: what.into() }
    }

    /// Whether the anchor's commit (or path) is simply gone, as opposed to
    /// a transient failure worth retrying later
    pub fn is_missing_revision(&self) -> bool {
        matches!(self, Self::RevisionUnavailable { .. } | Self::UntrackedPath { .. })
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, ResolveError>;
