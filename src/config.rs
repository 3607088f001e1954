//! Configuration file support
//!
//! Settings are layered: built-in defaults, then the TOML config file, then
//! command-line flags.
//!
//! ```toml
//! [client]
//! endpoint = "http://127.0.0.1:3000/api/process-image"
//! timeout_secs = 120
//!
//! [defaults]
//! corner = "bottom right"
//! tool = "generative-remove"
//!
//! [output]
//! archive_name = "healed-images.zip"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::archive::DEFAULT_ARCHIVE_NAME;
use crate::selection::{Corner, ProcessingSelection, Tool};

/// Default image-editing service endpoint
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/api/process-image";

/// Config directory name under the platform config dir
pub const CONFIG_DIR_NAME: &str = "corner-heal";

/// Config file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Could not serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Image-editing service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// URL edit requests are posted to
    pub endpoint: String,
    /// Transport timeout per request; none by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: None,
        }
    }
}

impl ClientConfig {
    /// Timeout as a duration
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Initial corner and tool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub corner: Corner,
    pub tool: Tool,
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File name used when no archive path is given
    pub archive_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub defaults: DefaultsConfig,
    pub output: OutputConfig,
}

/// Values given on the command line; `None` keeps the config file value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub endpoint: Option<String>,
    pub timeout_secs: Option<u64>,
    pub corner: Option<Corner>,
    pub tool: Option<Tool>,
}

impl CliOverrides {
    /// Create empty overrides
    pub fn new() -> Self {
        Self::default()
    }
}

impl Config {
    /// Default config file location, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Render as TOML text
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write to `path`, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Apply command-line overrides on top of this config
    pub fn merge_with_cli(&self, overrides: &CliOverrides) -> Config {
        let mut merged = self.clone();
        if let Some(endpoint) = &overrides.endpoint {
            merged.client.endpoint = endpoint.clone();
        }
        if let Some(timeout) = overrides.timeout_secs {
            merged.client.timeout_secs = Some(timeout);
        }
        if let Some(corner) = overrides.corner {
            merged.defaults.corner = corner;
        }
        if let Some(tool) = overrides.tool {
            merged.defaults.tool = tool;
        }
        merged
    }

    /// Initial engine selection
    pub fn selection(&self) -> ProcessingSelection {
        ProcessingSelection::new(self.defaults.corner, self.defaults.tool)
    }
}
