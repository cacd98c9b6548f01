use std::path::Path;

use anyhow::Result;
use busyblock_core::config::ConfigOverrides;
use owo_colors::OwoColorize;

use super::{config_path, load_config};

pub fn run(explicit: Option<&Path>, path_only: bool) -> Result<()> {
    let path = config_path(explicit)?;
    let config = load_config(Some(&path), &ConfigOverrides::default())?;

    if path_only {
        println!("{}", path.display());
        return Ok(());
    }

    println!("{}", "Paths".bold());
    println!("  Config:    {}", path.display());
    if let Some(root) = config.backend.ics_root() {
        println!("  Calendars: {}", root.display());
    }
    println!();
    println!("{}", "Effective configuration".bold());
    for line in config.to_toml()?.lines() {
        println!("  {}", line);
    }

    Ok(())
}
