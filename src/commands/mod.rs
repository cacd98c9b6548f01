pub mod config;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::Result;
use busyblock_core::config::{ConfigOverrides, SyncConfig};

/// The config file to use: `--config` if given, else the default location.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(SyncConfig::config_path()?),
    }
}

pub fn load_config(explicit: Option<&Path>, overrides: &ConfigOverrides) -> Result<SyncConfig> {
    let path = config_path(explicit)?;
    Ok(SyncConfig::load(&path, overrides)?)
}
