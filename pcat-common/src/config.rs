//! Configuration loading
//!
//! Each setting is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`PCAT_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, Result};

pub const ENV_DATABASE: &str = "PCAT_DATABASE";
pub const ENV_BIND: &str = "PCAT_BIND";
pub const ENV_STORE_BACKEND: &str = "PCAT_STORE_BACKEND";
pub const ENV_STORE_URL: &str = "PCAT_STORE_URL";
pub const ENV_STORE_KEY: &str = "PCAT_STORE_KEY";

pub const DEFAULT_BIND: &str = "127.0.0.1:5740";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Values shipped in sample `.env` files; never valid credentials
const PLACEHOLDER_URL: &str = "https://your-project-id.supabase.co";
const PLACEHOLDER_KEY: &str = "your-anon-key-here";

/// Which store implementation backs the catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Embedded SQLite database
    #[default]
    Sqlite,
    /// Hosted backend reached over RPC
    Rpc,
}

impl std::str::FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "rpc" | "remote" => Ok(StoreBackend::Rpc),
            other => Err(Error::Config(format!("unknown store backend '{}'", other))),
        }
    }
}

/// `[store]` table of the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub api_key: Option<String>,
}

/// Validated connection settings for the remote store
#[derive(Debug, Clone, PartialEq)]
pub struct RpcConfig {
    pub url: String,
    pub api_key: String,
}

impl StoreSettings {
    /// Remote credentials, rejecting missing or placeholder values
    pub fn rpc_config(&self) -> Result<RpcConfig> {
        let url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Config(format!("store URL not configured (set {} or [store].url)", ENV_STORE_URL)))?;
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config(format!("store API key not configured (set {} or [store].api_key)", ENV_STORE_KEY)))?;

        if url == PLACEHOLDER_URL || api_key == PLACEHOLDER_KEY {
            return Err(Error::Config(
                "store credentials are still the sample placeholders; configure the real project URL and key"
                    .to_string(),
            ));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!("store URL must be http(s): {}", url)));
        }

        Ok(RpcConfig {
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

/// Catalog configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// SQLite database file (sqlite backend only)
    pub database_path: Option<PathBuf>,
    /// HTTP listen address
    pub bind: String,
    /// Deadline for one store request, milliseconds
    pub request_timeout_ms: u64,
    pub store: StoreSettings,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            bind: DEFAULT_BIND.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            store: StoreSettings::default(),
        }
    }
}

/// Command-line overrides (priority 1)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub bind: Option<String>,
}

impl CatalogConfig {
    /// Resolve configuration from CLI, process environment, TOML and defaults
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        Self::load_with_env(overrides, |key| std::env::var(key).ok())
    }

    /// Same as [`CatalogConfig::load`] with an injectable environment
    pub fn load_with_env<F>(overrides: &ConfigOverrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Priority 3: TOML config file
        let mut config = match &overrides.config_file {
            Some(path) => Self::from_file(path)?,
            None => match default_config_file() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        // Priority 2: Environment variables
        if let Some(path) = env(ENV_DATABASE) {
            config.database_path = Some(PathBuf::from(path));
        }
        if let Some(bind) = env(ENV_BIND) {
            config.bind = bind;
        }
        if let Some(backend) = env(ENV_STORE_BACKEND) {
            config.store.backend = backend.parse()?;
        }
        if let Some(url) = env(ENV_STORE_URL) {
            config.store.url = Some(url);
        }
        if let Some(key) = env(ENV_STORE_KEY) {
            config.store.api_key = Some(key);
        }

        // Priority 1: Command-line arguments
        if let Some(path) = &overrides.database_path {
            config.database_path = Some(path.clone());
        }
        if let Some(bind) = &overrides.bind {
            config.bind = bind.clone();
        }

        debug!(?config, "Resolved catalog configuration");
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Database file, falling back to the OS data directory
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// `~/.config/pcat/config.toml` (platform equivalent elsewhere)
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pcat").join("config.toml"))
}

/// `~/.local/share/pcat/catalog.db` (platform equivalent elsewhere)
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("pcat"))
        .unwrap_or_else(|| PathBuf::from("./pcat_data"))
        .join("catalog.db")
}
