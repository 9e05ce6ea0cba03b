//! Show who wrote a line range

use crate::util;
use anchor_cache::MemoryStore;
use anchor_engine::{config, Resolver};
use anchor_git::GitCommand;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;

pub async fn run(file: &Path, lines: &str, dirty: bool) -> Result<()> {
    let repo_root = util::find_repo_root()?;
    let file = util::absolute(file)?;
    let range = util::parse_line_range(lines)?;
    let config = config::load()?;

    let runner = GitCommand::new(config.git.executable.clone(), config.git.timeout());
    let resolver = Resolver::new(repo_root, Arc::new(runner), Arc::new(MemoryStore::new()), &config);

    let contents = if dirty {
        let text = std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        Some(text)
    } else {
        None
    };

    let authors = resolver.authors(&file, range, contents.as_deref()).await;

    if authors.is_empty() {
        println!(
            "{}",
            format!("No committed authors for lines {}-{}", range.start, range.end).dimmed()
        );
        return Ok(());
    }

    println!(
        "{} {}",
        "Authors".bold(),
        format!("(lines {}-{})", range.start, range.end).dimmed()
    );
    for email in authors.iter() {
        println!("  {}", email.cyan());
    }

    Ok(())
}
