// Device selection persistence
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::audio::DeviceId;
use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Persisted as `{"DeviceIds": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppConfig {
    #[serde(default)]
    pub device_ids: Option<Vec<DeviceId>>,
}

impl AppConfig {
    pub fn from_ids(ids: &BTreeSet<DeviceId>) -> Self {
        Self {
            device_ids: Some(ids.iter().cloned().collect()),
        }
    }

    pub fn into_ids(self) -> BTreeSet<DeviceId> {
        self.device_ids.unwrap_or_default().into_iter().collect()
    }
}

/// Loads and saves the target set.
///
/// `load` never fails: any problem reading the config degrades to an empty set.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> BTreeSet<DeviceId>;

    fn save(&self, ids: &BTreeSet<DeviceId>) -> Result<(), ConfigError>;
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for `config.json` inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CONFIG_FILE_NAME))
    }

    fn read(&self) -> Result<Option<AppConfig>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Decode {
            path: self.path.clone(),
            source,
        })
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> BTreeSet<DeviceId> {
        match self.read() {
            Ok(Some(config)) => {
                debug!(path = %self.path.display(), "Loaded config");
                config.into_ids()
            }
            Ok(None) => {
                info!(path = %self.path.display(), "No config file found, nothing selected");
                BTreeSet::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable config");
                BTreeSet::new()
            }
        }
    }

    fn save(&self, ids: &BTreeSet<DeviceId>) -> Result<(), ConfigError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(&AppConfig::from_ids(ids))?;
        fs::write(&self.path, content).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), devices = ids.len(), "Saved config");
        Ok(())
    }
}
