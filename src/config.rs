use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::compress::CompressOptions;
use crate::lock::LockOptions;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct HomescreenConfig {
    pub storage: StorageConfig,
    pub compression: CompressOptions,
    pub lock: LockOptions,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub database: String,
    /// JSON dump of the older flat key-value storage to migrate from
    pub legacy_path: Option<String>,
    /// Reported by `usage`; no quota is reported when unset
    pub quota_bytes: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path().to_string_lossy().into_owned(),
            legacy_path: None,
            quota_bytes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    pub translate_endpoint: Option<String>,
    pub music: Vec<MusicProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MusicProviderConfig {
    pub name: String,
    pub endpoint: String,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("homescreen.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from(".homescreen").join("homescreen.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<HomescreenConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: HomescreenConfig = toml::from_str(&contents)?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &HomescreenConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
