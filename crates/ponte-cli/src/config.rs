//! Host configuration parsing (ponte.toml)
//!
//! ```toml
//! frames = 120
//!
//! [library]
//! path = "target/release/libgame.so"
//!
//! [bridge]
//! fixed_ticks_per_frame = 2
//!
//! [[proxy]]
//! class = "Game.Player"
//! name = "Player"
//! ```

use std::path::{Path, PathBuf};

use ponte_bridge::BridgeOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default configuration file name
pub const CONFIG_FILE: &str = "ponte.toml";

/// Errors that can occur while loading a host configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Host configuration (ponte.toml)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostConfig {
    /// Native library to load
    #[serde(default)]
    pub library: LibraryConfig,

    /// Bridge options
    #[serde(default)]
    pub bridge: BridgeOptions,

    /// Frames to run before shutting down
    #[serde(default = "default_frames")]
    pub frames: u64,

    /// Native components to spawn at startup
    #[serde(default, rename = "proxy")]
    pub proxies: Vec<ProxyConfig>,
}

/// `[library]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LibraryConfig {
    /// Path of the shared library, relative to the config file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// One `[[proxy]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyConfig {
    /// Native class passed to `CreateInstance`
    pub class: String,

    /// Name native code can address the proxy by
    pub name: String,

    /// Whether per-frame hooks run from the start
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_frames() -> u64 {
    1
}

fn default_enabled() -> bool {
    true
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            library: LibraryConfig::default(),
            bridge: BridgeOptions::default(),
            frames: default_frames(),
            proxies: Vec::new(),
        }
    }
}

impl HostConfig {
    /// Load a configuration file. A relative library path is resolved
    /// against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_str(&content)?;
        if let (Some(library), Some(dir)) = (config.library.path.as_mut(), path.parent()) {
            if library.is_relative() {
                *library = dir.join(&*library);
            }
        }
        Ok(config)
    }

    /// Parse a configuration from a string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: HostConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge.native_log_target.is_empty() {
            return Err(ConfigError::ValidationError(
                "bridge.native_log_target cannot be empty".to_string(),
            ));
        }

        let mut names = std::collections::HashSet::new();
        for proxy in &self.proxies {
            if proxy.class.is_empty() || proxy.name.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "proxy entries need a class and a name (got class {:?}, name {:?})",
                    proxy.class, proxy.name
                )));
            }
            if proxy.class.contains('\0') {
                return Err(ConfigError::ValidationError(format!(
                    "proxy class {:?} contains a NUL byte",
                    proxy.class
                )));
            }
            if !names.insert(proxy.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate proxy name: {}",
                    proxy.name
                )));
            }
        }
        Ok(())
    }

    /// Library path, if one is configured
    pub fn library_path(&self) -> Option<&Path> {
        self.library.path.as_deref()
    }
}
