//! Configuration management command
//!
//! Provides CLI interface to view and edit engine configuration.

use anchor_engine::config::{self, EngineConfig};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;

/// List all configuration values
pub async fn run_list() -> Result<()> {
    let config = config::load()?;
    let config_path = config::config_file_path().context("Could not determine config file path")?;

    println!("{}", "Engine Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), config_path.display().dimmed());

    println!("{}", "[git]".yellow());
    println!("  {} = {}", "executable".cyan(), config.git.executable);
    println!(
        "  {} = {} {}",
        "timeout_ms".cyan(),
        config.git.timeout_ms,
        format!("({:.1}s)", config.git.timeout_ms as f64 / 1000.0).dimmed()
    );

    println!("\n{}", "[cache]".yellow());
    println!(
        "  {} = {} {}",
        "path".cyan(),
        config.get("cache.path").unwrap_or_default(),
        if config.cache.path.is_none() {
            "(default)".dimmed().to_string()
        } else {
            String::new()
        }
    );
    println!("  {} = {}", "delta_capacity".cyan(), config.cache.delta_capacity);

    println!("\n{}", "[backtrack]".yellow());
    println!("  {} = {}", "max_chain_len".cyan(), config.backtrack.max_chain_len);

    println!("\n{}", "Valid Ranges:".bold());
    println!("  timeout_ms: 100-600,000");
    println!("  delta_capacity: 1-100,000");
    println!("  max_chain_len: 1-1024");

    Ok(())
}

/// Get a single configuration value
pub async fn run_get(key: &str) -> Result<()> {
    let config = config::load()?;

    let value = config.get(key).with_context(|| {
        format!(
            "Unknown config key: {}. Use 'anchor config list' to see available keys.",
            key
        )
    })?;

    println!("{}", value);
    Ok(())
}

/// Set a configuration value
pub async fn run_set(key: &str, value: &str) -> Result<()> {
    let mut config = config::load()?;
    apply(&mut config, key, value)?;

    // Validate before saving
    config.validate().context("Invalid configuration value")?;

    config::save(&config)?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);
    Ok(())
}

fn apply(config: &mut EngineConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "git.executable" => {
            config.git.executable = value.to_string();
        }
        "git.timeout_ms" => {
            config.git.timeout_ms = value
                .parse()
                .context("Invalid value: must be a positive integer")?;
        }
        "cache.path" => {
            config.cache.path = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }
        "cache.delta_capacity" => {
            config.cache.delta_capacity = value
                .parse()
                .context("Invalid value: must be a positive integer")?;
        }
        "backtrack.max_chain_len" => {
            config.backtrack.max_chain_len = value
                .parse()
                .context("Invalid value: must be a positive integer")?;
        }
        _ => anyhow::bail!(
            "Unknown config key: {}. Use 'anchor config list' to see available keys.",
            key
        ),
    }
    Ok(())
}

/// Show the config file path and optionally create it
pub async fn run_path(create: bool) -> Result<()> {
    let config_path = config::config_file_path().context("Could not determine config file path")?;

    if create && !config_path.exists() {
        config::init_if_missing()?;
        println!("{} Created config file at: {}", "✓".green(), config_path.display());
    } else if config_path.exists() {
        println!("{}", config_path.display());
    } else {
        println!("{}", config_path.display());
        println!("{}", "File does not exist. Use --create to create it.".yellow());
    }

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    println!("{}", config::example_config());
    Ok(())
}
