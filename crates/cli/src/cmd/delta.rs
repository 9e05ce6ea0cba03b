//! Show the normalized line edits between two revisions of a file

use crate::diff_utils;
use crate::util;
use anchor_core::{build_delta, parse_unified_diff, SnapshotRef};
use anchor_engine::config;
use anchor_git::{BlameResolver, GitCommand, VersionControlRunner};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;
use std::sync::Arc;

pub async fn run(file: &Path, old_rev: &str, new_rev: Option<&str>, stat: bool) -> Result<()> {
    let repo_root = util::find_repo_root()?;
    let file = util::absolute(file)?;
    let config = config::load()?;

    let runner: Arc<dyn VersionControlRunner> =
        Arc::new(GitCommand::new(config.git.executable.clone(), config.git.timeout()));
    let table = BlameResolver::new(Arc::clone(&runner)).discover(&repo_root).await;
    let (context, relative) = table.resolve(&file);

    let old_text = runner
        .read_file_at_revision(&context.root, &relative, old_rev)
        .await
        .with_context(|| format!("Failed to read {} at {}", relative, old_rev))?;

    let (delta, new_text, new_label) = match new_rev {
        Some(new_rev) => {
            let new_text = runner
                .read_file_at_revision(&context.root, &relative, new_rev)
                .await
                .with_context(|| format!("Failed to read {} at {}", relative, new_rev))?;
            let patch = runner
                .diff_revisions(&context.root, old_rev, new_rev, &relative)
                .await
                .context("Failed to diff revisions")?;
            let delta = parse_unified_diff(SnapshotRef::commit(old_rev), SnapshotRef::commit(new_rev), &patch)?;
            (delta, new_text, util::short(new_rev).to_string())
        }
        None => {
            let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let new_ref = SnapshotRef::buffer(&String::from_utf8_lossy(&bytes));
            let delta = build_delta(SnapshotRef::commit(old_rev), old_text.as_bytes(), new_ref, &bytes)?;
            (delta, String::from_utf8_lossy(&bytes).into_owned(), "working tree".to_string())
        }
    };

    println!(
        "{} {} {} {}",
        relative.bold(),
        util::short(old_rev).yellow(),
        "->".dimmed(),
        new_label.yellow()
    );

    if delta.is_identity() {
        println!("  {}", "No changes".dimmed());
        return Ok(());
    }

    println!("  {}\n", diff_utils::summarize(&delta));
    let rendered = if stat {
        diff_utils::render_delta(&delta, None, None)
    } else {
        diff_utils::render_delta(&delta, Some(&old_text), Some(&new_text))
    };
    print!("{}", rendered);

    Ok(())
}
