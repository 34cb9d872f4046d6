use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use tracing::debug;

pub const CONFIG_FILE: &str = "config.toml";

/// Settings read from `config.toml`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory that bare document ids resolve against. Defaults to the
    /// working directory.
    pub library_dir: Option<PathBuf>,
    pub format_cache_capacity: usize,
    /// Used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub restore_state: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_dir: None,
            format_cache_capacity: 64,
            log_filter: "info".to_string(),
            restore_state: true,
        }
    }
}

impl Config {
    pub fn default_path(project_dirs: &ProjectDirs) -> PathBuf {
        project_dirs.config_dir().join(CONFIG_FILE)
    }

    /// Reads the file at `path`; a missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read config file {:?}", path))
            }
        };
        Self::parse(&contents).with_context(|| format!("invalid config file {:?}", path))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }
}
