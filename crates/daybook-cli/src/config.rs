//! Persistent CLI configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use daybook_core::auth::resolve_optional_backend_config;
use daybook_core::util::{is_http_url, normalize_text_option};

const CONFIG_FILE_NAME: &str = "cli-config.json";
const STORE_FILE_NAME: &str = "store.db";

/// On-disk CLI configuration for the sync backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub backend_url: Option<String>,
    #[serde(default)]
    pub backend_anon_key: Option<String>,
    #[serde(default)]
    pub record_table: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| panic!("Failed to resolve CLI config directory"))
        .join("daybook")
        .join(CONFIG_FILE_NAME)
}

pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| panic!("Failed to resolve CLI data directory"))
        .join("daybook")
        .join(STORE_FILE_NAME)
}

impl CliConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path();
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Resolve the backend URL/key pair, with env-var overrides taking
    /// precedence over the config file.
    ///
    /// Returns `Ok(None)` when no backend is configured at all.
    pub fn resolve_backend(&self) -> Result<Option<(String, String)>, String> {
        let url = normalize_text_option(std::env::var("DAYBOOK_BACKEND_URL").ok())
            .or_else(|| self.backend_url.clone());
        let anon_key = normalize_text_option(std::env::var("DAYBOOK_BACKEND_ANON_KEY").ok())
            .or_else(|| self.backend_anon_key.clone());

        resolve_optional_backend_config(url, anon_key).map_err(|error| error.to_string())
    }

    fn normalize(&mut self) {
        self.version = self.version.max(1);
        self.backend_url = normalize_text_option(self.backend_url.take())
            .filter(|url| is_http_url(url))
            .map(|url| url.trim_end_matches('/').to_string());
        self.backend_anon_key = normalize_text_option(self.backend_anon_key.take());
        self.record_table = normalize_text_option(self.record_table.take());
    }
}
