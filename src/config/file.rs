//! `config.toml` loading.

use std::path::{Path, PathBuf};

use crate::error::VolError;

use super::paths::default_config_path;
use super::types::VolkeeperConfig;

/// A loaded configuration and the file it came from.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub config: VolkeeperConfig,
    /// False when no file existed and defaults were used.
    pub from_disk: bool,
}

impl ConfigFile {
    /// Load `path`, falling back to defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, VolError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self {
                path: path.to_path_buf(),
                config: VolkeeperConfig::default(),
                from_disk: false,
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let config: VolkeeperConfig = toml::from_str(&contents)?;
        validate(&config)?;
        Ok(Self {
            path: path.to_path_buf(),
            config,
            from_disk: true,
        })
    }
}

/// Load the config from `explicit`, or from the default location.
///
/// An explicitly named file must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<ConfigFile, VolError> {
    match explicit {
        Some(path) if !path.exists() => Err(VolError::Config(format!(
            "Config file not found: {}",
            path.display()
        ))),
        Some(path) => ConfigFile::load(path),
        None => ConfigFile::load(&default_config_path()?),
    }
}

fn validate(config: &VolkeeperConfig) -> Result<(), VolError> {
    if config.backend.url.trim().is_empty() {
        return Err(VolError::Config("backend.url must not be empty".into()));
    }
    if config.events.engine.trim().is_empty() {
        return Err(VolError::Config("events.engine must not be empty".into()));
    }
    for (name, label) in [
        ("events.project_label", &config.events.project_label),
        ("events.refresh_label", &config.events.refresh_label),
    ] {
        if label.trim().is_empty() {
            return Err(VolError::Config(format!("{} must not be empty", name)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let loaded = ConfigFile::load(&tmp.path().join("config.toml")).unwrap();
        assert!(!loaded.from_disk);
        assert_eq!(loaded.config, VolkeeperConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[backend]\nurl = \"http://10.0.0.5:9000\"\ntimeout_secs = 20\n\n[poll]\ninterval_secs = 0\n",
        )
        .unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert!(loaded.from_disk);
        assert_eq!(loaded.config.backend.url, "http://10.0.0.5:9000");
        assert_eq!(loaded.config.backend.timeout_secs, Some(20));
        assert!(loaded.config.poll.interval().is_none());
        assert_eq!(loaded.config.events.engine, "docker");
        assert!(loaded.config.events.reconnect);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[backend\nurl = ").unwrap();
        let err = ConfigFile::load(&path).unwrap_err();
        assert!(format!("{}", err).contains("Invalid config.toml"));
    }

    #[test]
    fn empty_engine_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[events]\nengine = \"\"\n").unwrap();
        assert!(ConfigFile::load(&path).is_err());
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nope.toml");
        assert!(load_config(Some(&path)).is_err());
    }
}
