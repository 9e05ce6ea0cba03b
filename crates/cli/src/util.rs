//! Shared utilities for CLI commands

use anchor_core::{Location, LocationMeta};
use anchor_git::LineRange;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// Find repository root by walking up from cwd to find .git
pub fn find_repo_root() -> Result<PathBuf> {
    let current = std::env::current_dir().context("Failed to get current directory")?;
    find_repo_root_from(&current)
}

pub fn find_repo_root_from(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        // .git is a file in worktrees and submodules
        if current.join(".git").exists() {
            return Ok(current);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => anyhow::bail!("Not a git repository (no .git found above {})", start.display()),
        }
    }
}

/// Make a file argument absolute against the current directory
pub fn absolute(file: &Path) -> Result<PathBuf> {
    if file.is_absolute() {
        return Ok(file.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(cwd.join(file))
}

/// Parse `start_line,start_col,end_line,end_col`
///
/// `*` or an empty component means absent.
pub fn parse_location(text: &str) -> Result<Location> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        anyhow::bail!("Location must have 4 components (got {}): {}", parts.len(), text);
    }

    let mut values = [None; 4];
    for (slot, part) in values.iter_mut().zip(&parts) {
        if part.is_empty() || *part == "*" {
            continue;
        }
        let value: u32 = part
            .parse()
            .with_context(|| format!("Invalid location component '{}'", part))?;
        if value == 0 {
            anyhow::bail!("Location components are 1-based (got 0 in {})", text);
        }
        *slot = Some(value);
    }

    let location = Location::from_array(values);
    if !location.is_well_formed() {
        anyhow::bail!("Location end is before its start: {}", text);
    }
    Ok(location)
}

/// Parse `start,end` into an inclusive line range
pub fn parse_line_range(text: &str) -> Result<LineRange> {
    let (start, end) = text
        .split_once(',')
        .with_context(|| format!("Line range must be start,end: {}", text))?;
    let start: u32 = start.trim().parse().context("Invalid range start")?;
    let end: u32 = end.trim().parse().context("Invalid range end")?;
    if start == 0 || end == 0 {
        anyhow::bail!("Line numbers are 1-based");
    }
    Ok(LineRange::new(start, end))
}

/// Short form of a commit hash
pub fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

/// Colored list of the flags set on `meta`
pub fn describe_meta(meta: &LocationMeta) -> String {
    let mut flags = Vec::new();
    if meta.entirely_deleted {
        flags.push("entirely deleted".red().to_string());
    } else {
        if meta.start_was_deleted {
            flags.push("start deleted".yellow().to_string());
        }
        if meta.end_was_deleted {
            flags.push("end deleted".yellow().to_string());
        }
    }
    if meta.content_changed {
        flags.push("content changed".yellow().to_string());
    }

    if flags.is_empty() {
        "exact".green().to_string()
    } else {
        flags.join(", ")
    }
}
