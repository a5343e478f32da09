use std::path::{Path, PathBuf};

use log::{debug, info};

use super::ConfigError;
use crate::models::ClashConfig;
use crate::utils::file::{file_exists, file_get, file_write};

/// The configuration on disk, kept as a YAML document plus a JSON mirror
/// next to it (`<yaml path>.json`).
#[derive(Debug, Clone)]
pub struct ConfigStore {
    yaml_path: PathBuf,
}

impl ConfigStore {
    /// Either representation's path is accepted; a `.json` suffix is dropped
    /// to find the YAML document.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let yaml_path = match path.to_str().and_then(|s| s.strip_suffix(".json")) {
            Some(stripped) => PathBuf::from(stripped),
            None => path.to_path_buf(),
        };
        Self { yaml_path }
    }

    pub fn yaml_path(&self) -> &Path {
        &self.yaml_path
    }

    pub fn json_path(&self) -> PathBuf {
        let mut path = self.yaml_path.clone().into_os_string();
        path.push(".json");
        PathBuf::from(path)
    }

    pub fn exists(&self) -> bool {
        file_exists(self.json_path()) || file_exists(&self.yaml_path)
    }

    /// Reads the JSON mirror when present, the YAML document otherwise.
    pub fn load(&self) -> Result<ClashConfig, ConfigError> {
        let json_path = self.json_path();
        if file_exists(&json_path) {
            debug!("Loading configuration from {}", json_path.display());
            let content = file_get(&json_path)?;
            return Ok(serde_json::from_str(&content)?);
        }
        if file_exists(&self.yaml_path) {
            debug!("Loading configuration from {}", self.yaml_path.display());
            let content = file_get(&self.yaml_path)?;
            return Ok(serde_yaml::from_str(&content)?);
        }
        Err(ConfigError::NotFound(self.yaml_path.display().to_string()))
    }

    /// Writes both representations.
    pub fn save(&self, config: &ClashConfig) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(config)?;
        let json = serde_json::to_string(config)?;
        file_write(&self.yaml_path, yaml.as_bytes())?;
        let json_path = self.json_path();
        file_write(&json_path, json.as_bytes())?;
        info!(
            "Configuration written to {} and {}",
            self.yaml_path.display(),
            json_path.display()
        );
        Ok(())
    }
}
