//! Platform-specific config directory helpers.
//!
//! Uses the `dirs` crate to resolve platform-appropriate directories:
//! - Linux:   `~/.config/volkeeper/`
//! - Windows: `%APPDATA%\volkeeper\`
//! - macOS:   `~/Library/Application Support/volkeeper/`

use std::path::PathBuf;

use crate::error::VolError;

/// Get the volkeeper config directory. Does not create it.
pub fn volkeeper_config_dir() -> Result<PathBuf, VolError> {
    let base = dirs::config_dir()
        .ok_or_else(|| VolError::Config("Could not determine config directory".into()))?;
    Ok(base.join("volkeeper"))
}

/// Default location of `config.toml`.
pub fn default_config_path() -> Result<PathBuf, VolError> {
    Ok(volkeeper_config_dir()?.join("config.toml"))
}
