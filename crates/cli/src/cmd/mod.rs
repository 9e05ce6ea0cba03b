//! CLI command implementations

pub mod authors;
pub mod config;
pub mod delta;
pub mod locate;
