//! Engine configuration, parsed from TOML.
//!
//! ```toml
//! builtin_converters = true
//! manifests = ["/etc/coerce/extra.manifest"]
//!
//! [render]
//! pretty = false
//!
//! [clone]
//! guard_cycles = true
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Load the converters shipped with the engine.
    pub builtin_converters: bool,
    /// Extra extension manifests, loaded after the builtin one.
    pub manifests: Vec<PathBuf>,
    pub render: RenderConfig,
    pub clone: CloneConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            builtin_converters: true,
            manifests: Vec::new(),
            render: RenderConfig::default(),
            clone: CloneConfig::default(),
        }
    }
}

/// String rendering of composite values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Indent nested tags, four spaces per level.
    pub pretty: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CloneConfig {
    /// Preserve cycles instead of recursing into them.
    pub guard_cycles: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }
}
