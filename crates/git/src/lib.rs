//! Git integration for anchor resolution
//!
//! This crate provides:
//! - The `VersionControlRunner` seam and its `git` subprocess implementation
//! - Typed classification of git failures
//! - Submodule-aware routing of file paths
//! - Blame-based author attribution

pub mod blame;
pub mod command;
pub mod error;
pub mod runner;
pub mod submodule;

// Re-exports
pub use blame::{collect_authors, parse_porcelain, AuthorSet, BlameResolver};
pub use command::GitCommand;
pub use error::{GitError, Result};
pub use runner::{BlameLine, BlameOptions, LineRange, VersionControlRunner, UNCOMMITTED_SHA};
pub use submodule::{RepositoryContext, SubmoduleTable};
