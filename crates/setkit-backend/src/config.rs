use crate::BackendError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BACKEND: &str = crate::backend::AUTO_BACKEND;

fn default_backend() -> String {
    DEFAULT_BACKEND.to_owned()
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Backend used when none is given on the command line.
    #[serde(default = "default_backend")]
    pub backend: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

impl BackendConfig {
    #[must_use]
    pub fn with_backend(mut self, backend: &str) -> Self {
        self.backend = backend.to_owned();
        self
    }

    /// Load `$XDG_CONFIG_HOME/setkit/config.toml`, or defaults when the file
    /// does not exist.
    pub fn load_default() -> Result<Self, BackendError> {
        let path = default_config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self, BackendError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            BackendError::Config(format!("invalid config {}: {e}", path.display()))
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), BackendError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| BackendError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub fn default_config_path() -> Result<PathBuf, BackendError> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir).join("setkit/config.toml"));
    }
    let home =
        std::env::var("HOME").map_err(|_| BackendError::Config("HOME not set".to_owned()))?;
    Ok(PathBuf::from(home).join(".config/setkit/config.toml"))
}
