//! Configuration commands.

use anyhow::{bail, Context, Result};
use console::style;
use gcn_core::{Settings, CONFIG_FILE};
use std::path::Path;

/// Write a default gcn.toml into `dir`.
pub fn init(dir: &Path, force: bool) -> Result<()> {
    let path = dir.join(CONFIG_FILE);
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Settings::default()
        .save(dir)
        .context("Failed to write configuration")?;

    println!("Wrote {}", style(path.display()).green());
    println!();
    println!("Edit [backend] base_url to point at your CMS, then run:");
    println!("  gcn login <user> <password>");
    Ok(())
}

/// Print the configuration in effect for `dir`.
pub fn show(dir: &Path) -> Result<()> {
    let settings = Settings::load(dir).context("Failed to load gcn.toml")?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
