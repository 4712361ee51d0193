use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level cuwrap configuration, loaded from cuwrap.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CuwrapConfig {
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub launch: LaunchConfigSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Driver library to load (None = platform default names)
    pub library: Option<String>,
    /// Flags passed to cuInit
    #[serde(default)]
    pub init_flags: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device treated as current while no context is active
    #[serde(default)]
    pub default: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaunchConfigSection {
    /// Check launch dimensions and shared memory against device limits
    /// before handing the launch to the driver
    #[serde(default)]
    pub check_limits: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { default: 0 }
    }
}

impl CuwrapConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path, e)))?;
        let config = Self::from_toml(&content)?;
        if config.device.default < 0 {
            return Err(Error::Config(format!(
                "{}: device.default must not be negative (got {})",
                path, config.device.default
            )));
        }
        Ok(config)
    }

    /// Load configuration from file if it exists, otherwise return defaults.
    pub fn load_or_default(path: &str) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if std::path::Path::new(path).exists() {
                    tracing::warn!("ignoring configuration: {}", e);
                }
                Self::default()
            }
        }
    }
}

/// Returns the default config file path based on platform conventions.
/// Search order:
/// 1. System-wide config: `%PROGRAMDATA%\cuwrap\cuwrap.toml` (Windows) or `/etc/cuwrap/cuwrap.toml` (Linux/macOS)
/// 2. Local fallback: `./cuwrap.toml`
pub fn default_config_path() -> String {
    #[cfg(windows)]
    {
        let programdata = std::env::var("PROGRAMDATA")
            .unwrap_or_else(|_| r"C:\ProgramData".to_string());
        let system_path = format!(r"{}\cuwrap\cuwrap.toml", programdata);
        if std::path::Path::new(&system_path).exists() {
            return system_path;
        }
    }
    #[cfg(not(windows))]
    {
        let system_path = "/etc/cuwrap/cuwrap.toml";
        if std::path::Path::new(system_path).exists() {
            return system_path.to_string();
        }
    }
    "cuwrap.toml".to_string()
}
