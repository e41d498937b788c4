//! CLI configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/packdesk/config.toml`
//! - Windows: `%APPDATA%/packdesk/config.toml`

use std::path::{Path, PathBuf};

use packdesk_transfer::DEFAULT_FIREBASE_BASE_URL;
use packdesk_upload::DEFAULT_MAX_FILE_BYTES;
use serde::{Deserialize, Serialize};

/// Where uploaded images are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Chunked writes into a local directory.
    #[default]
    Local,
    /// Resumable uploads to a Firebase Storage bucket.
    Firebase,
}

/// Image storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory used by the local backend.
    #[serde(default = "default_local_dir")]
    pub local_dir: String,

    /// Base URL the local directory is served under. `file://` URLs when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,

    #[serde(default)]
    pub firebase_bucket: String,

    #[serde(default = "default_firebase_base_url")]
    pub firebase_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_dir: default_local_dir(),
            public_base_url: None,
            firebase_bucket: String::new(),
            firebase_base_url: default_firebase_base_url(),
        }
    }
}

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the package API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Largest image accepted for upload, in bytes.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Upload chunk size in bytes (0 = channel default).
    #[serde(default)]
    pub chunk_size: usize,

    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".into()
}

fn default_max_file_bytes() -> u64 {
    DEFAULT_MAX_FILE_BYTES
}

fn default_local_dir() -> String {
    "uploads".into()
}

fn default_firebase_base_url() -> String {
    DEFAULT_FIREBASE_BASE_URL.into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            max_file_bytes: default_max_file_bytes(),
            chunk_size: 0,
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from `path` (or the platform default), creating
    /// it with defaults if not found.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path(),
        };

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        } else {
            let config = Config::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // Restrict permissions on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("packdesk").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("packdesk")
            .join("config.toml")
    }
}
