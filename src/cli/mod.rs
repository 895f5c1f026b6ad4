//! CLI command implementations.

pub(crate) mod demo;
pub(crate) mod run;

use anyhow::{Context, Result};
use netwatch::config::Config;

/// Print the effective configuration, optionally writing defaults first.
pub(crate) fn cmd_config(init: bool) -> Result<()> {
    let path = Config::path();
    if init && !path.exists() {
        Config::default()
            .save_to(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote default configuration to {}", path.display());
    }

    let config = Config::load().context("Failed to load configuration")?;
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
