//! Configuration file support.
//!
//! ```toml
//! manifests = ["/etc/coerce/extra.manifest"]
//!
//! [defaults]
//! verbose = true
//!
//! [render]
//! pretty = false
//! ```

use anyhow::{Context, Result};
use rhi_coerce_core::EngineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub defaults: Defaults,
    /// Engine settings live at the top level of the file.
    #[serde(flatten)]
    pub engine: EngineConfig,
}

/// Default CLI options.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub verbose: bool,
    pub quiet: bool,
}

impl Config {
    /// Load from `path`, or from the default location when none is given.
    ///
    /// A missing default file yields the default config; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// `<config dir>/coerce/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("coerce").join("config.toml"))
    }
}
