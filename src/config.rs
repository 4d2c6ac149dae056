//! Runtime configuration for the navigation admin backend
//!
//! Layering: built-in defaults, then `nav.toml` (or an explicit path), then `NAV_*`
//! environment variables with `__` separating nested keys (`NAV_SERVER__PORT=9000`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{NavError, NavResult};

const MIB: u64 = 1024 * 1024;

/// Extensions accepted for files carried inside a backup archive.
pub const BACKUP_EXTENSIONS: [&str; 18] = [
    "png", "jpg", "jpeg", "gif", "webp", "ico", "svg", "txt", "pdf", "ppt", "pptx", "xls", "xlsx",
    "doc", "docx", "rar", "zip", "7z",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NavConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/admin.db"),
            pool_size: 8,
        }
    }
}

/// Upload root and the limit for direct single-file uploads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub path: PathBuf,
    pub max_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./uploads"),
            max_size: 5 * MIB,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    pub json_path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            json_path: PathBuf::from("./static/nav.json"),
        }
    }
}

/// Limits applied to backup archives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    pub max_archive_size: u64,
    pub max_entry_size: u64,
    pub allowed_extensions: Vec<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            max_archive_size: 50 * MIB,
            max_entry_size: 10 * MIB,
            allowed_extensions: BACKUP_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub max_age_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
            max_age_secs: 86_400,
        }
    }
}

impl NavConfig {
    /// Reject configurations the components cannot work with.
    pub fn validate(&self) -> NavResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(NavError::config("database.path must be set"));
        }
        if self.upload.path.as_os_str().is_empty() {
            return Err(NavError::config("upload.path must be set"));
        }
        if self.snapshot.json_path.as_os_str().is_empty() {
            return Err(NavError::config("snapshot.json_path must be set"));
        }
        if self.database.pool_size == 0 {
            return Err(NavError::config("database.pool_size must be greater than zero"));
        }
        if self.upload.max_size == 0
            || self.backup.max_entry_size == 0
            || self.backup.max_archive_size == 0
        {
            return Err(NavError::config("size limits must be greater than zero"));
        }
        if self.backup.allowed_extensions.is_empty() {
            return Err(NavError::config("backup.allowed_extensions must not be empty"));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(NavError::config("session.cookie_name must be set"));
        }
        Ok(())
    }
}

/// Load configuration from defaults, an optional TOML file and `NAV_*` variables.
pub fn load_config(path: Option<&Path>) -> NavResult<NavConfig> {
    let toml_path = path.unwrap_or_else(|| Path::new("nav.toml"));

    let figment = Figment::from(Serialized::defaults(NavConfig::default()))
        .merge(Toml::file(toml_path))
        .merge(Env::prefixed("NAV_").split("__"));

    let config: NavConfig = figment
        .extract()
        .map_err(|e| NavError::config(format!("failed to load configuration: {e}")))?;

    config.validate()?;
    Ok(config)
}
