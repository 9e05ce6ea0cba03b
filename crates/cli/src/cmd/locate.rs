//! Resolve a recorded location against HEAD

use crate::util;
use anchor_engine::{config, ReferenceLocation, ResolveRequest, Resolver};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;
use tracing::debug;

pub async fn run(
    file: &Path,
    commit: &str,
    location: &str,
    marker: &str,
    stream: &str,
    dirty: bool,
    json: bool,
) -> Result<()> {
    let repo_root = util::find_repo_root()?;
    let file = util::absolute(file)?;
    let location = util::parse_location(location)?;
    let config = config::load()?;

    let resolver = Resolver::from_config(repo_root, &config).context("Failed to open location cache")?;

    let buffer = if dirty {
        let text = std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        Some(text)
    } else {
        None
    };

    let request = ResolveRequest {
        file: file.clone(),
        stream: stream.to_string(),
        marker: marker.to_string(),
        references: vec![ReferenceLocation {
            commit: commit.to_string(),
            location,
            canonical: true,
            backtracked: false,
        }],
        commit_chain: None,
        buffer,
        uncommitted: None,
    };

    debug!("Resolving {} from {}", file.display(), util::short(commit));
    let resolution = resolver.resolve(&request).await;
    resolver
        .location_cache()
        .flush()
        .context("Failed to flush location cache")?;

    if json {
        let value = serde_json::json!({
            "location": resolution.location,
            "meta": resolution.meta,
            "head": resolution.head,
            "dirty": resolution.dirty,
            "not_located": resolution.not_located,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if let Some(not_located) = &resolution.not_located {
        println!("{} {}", "✗".red(), "Anchor could not be located".bold());
        println!("  {}: {:?}", "Reason".dimmed(), not_located.reason);
        println!("  {}: {}", "Details".dimmed(), not_located.details);
        anyhow::bail!("Failed to locate {} from {}", file.display(), util::short(commit));
    }

    println!("{}", "Anchor Location".bold());
    println!("  {}: {}", "Location".dimmed(), resolution.location.to_string().cyan());
    if let Some(head) = &resolution.head {
        println!("  {}: {}", "HEAD".dimmed(), util::short(head).yellow());
    }
    println!(
        "  {}: {}",
        "Target".dimmed(),
        if resolution.dirty { "working tree" } else { "HEAD" }
    );
    println!("  {}: {}", "Status".dimmed(), util::describe_meta(&resolution.meta));

    Ok(())
}
