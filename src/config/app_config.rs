use chrono::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::errors::{ProtectorError, Result};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "dp.json";

/// Top-level configuration read from `dp.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(rename = "DataProtectorConfig", default)]
    pub data_protector: DataProtectorSection,

    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// The `DataProtectorConfig` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataProtectorSection {
    /// Directory holding key records. Absent means an ephemeral store.
    pub key_output_location: Option<PathBuf>,
    /// Application identity. Absent means one shared ring.
    pub application_name: Option<String>,
    /// Lifetime of generated keys. Absent means keys never expire.
    pub key_lifetime_days: Option<u32>,
}

impl AppConfig {
    /// Load the configuration.
    ///
    /// An explicit path must exist. Otherwise `./dp.json` is tried, then
    /// `<config dir>/data-protector/dp.json`; with neither present the
    /// defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ProtectorError::ConfigurationError {
                    detail: format!("config file {} not found", path.display()),
                });
            }
            return Self::load_from(path);
        }

        match Self::candidates().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse one configuration file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self =
            serde_json::from_str(&content).map_err(|e| ProtectorError::ConfigurationError {
                detail: format!("failed to parse {}: {e}", path.display()),
            })?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("data-protector").join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Apply command-line or environment overrides on top of the file.
    pub fn with_overrides(
        mut self,
        key_location: Option<PathBuf>,
        application: Option<String>,
    ) -> Self {
        if let Some(location) = key_location {
            self.data_protector.key_output_location = Some(location);
        }
        if let Some(name) = application {
            self.data_protector.application_name = Some(name);
        }
        self
    }

    /// Configured key directory. Blank values count as absent.
    pub fn key_location(&self) -> Option<&Path> {
        self.data_protector
            .key_output_location
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Configured application identity. Blank values count as absent.
    pub fn application_name(&self) -> Option<&str> {
        self.data_protector
            .application_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn key_lifetime(&self) -> Result<Option<Duration>> {
        match self.data_protector.key_lifetime_days {
            None => Ok(None),
            Some(0) => Err(ProtectorError::ConfigurationError {
                detail: "KeyLifetimeDays must be a positive number of days".into(),
            }),
            Some(days) => Ok(Some(Duration::days(i64::from(days)))),
        }
    }
}
