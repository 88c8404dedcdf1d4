//! Configuration management for the BestGameAccount client
//!
//! Settings live in a JSON file in the platform config directory. The
//! backend URL can be overridden with `NEXT_PUBLIC_API_URL`, which is the
//! variable the storefront itself is deployed with.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::{
    KeyringTokenStore, MemoryTokenStore, SqliteTokenStore, TokenStore, TokenStoreError,
};

/// Environment variable selecting the backend base URL
pub const API_URL_ENV: &str = "NEXT_PUBLIC_API_URL";

/// Hosted backend used when nothing else is configured
pub const DEFAULT_API_URL: &str = "https://fix-deploy-be.onrender.com";

/// Errors that can occur while persisting configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config path")]
    NoConfigDir,

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write config: {0}")]
    Io(#[from] std::io::Error),
}

/// Where tokens are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    /// Process memory only
    Memory,
    /// SQLite key-value file
    #[default]
    Sqlite,
    /// OS credential manager
    Keyring,
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL, without trailing slash
    pub api_base_url: String,
    /// Storefront URL used when redirecting the user
    pub frontend_url: String,
    /// Storefront path of the login page
    pub login_path: String,
    /// Backend path of the refresh endpoint
    pub refresh_path: String,
    /// Name of the cookie carrying the refresh token
    pub refresh_cookie_name: String,
    /// Whether a cookie jar is kept at all
    pub cookies_enabled: bool,
    /// Token storage backend
    pub token_storage: TokenStorage,
    /// SQLite file for [`TokenStorage::Sqlite`]; defaults into the config dir
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            frontend_url: "https://bestgameaccount.com".to_string(),
            login_path: "/login".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            refresh_cookie_name: "refreshToken".to_string(),
            cookies_enabled: true,
            token_storage: TokenStorage::default(),
            storage_path: None,
        }
    }
}

impl ClientConfig {
    /// Config pointing at a specific backend (for testing)
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            api_base_url: base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Gets the config directory path (cross-platform)
    fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA")
                .ok()
                .map(|p| PathBuf::from(p).join("BestGameAccount"))
        }

        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|p| PathBuf::from(p).join("Library/Application Support/BestGameAccount"))
        }

        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
                .map(|p| p.join("bestgame"))
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }

    /// Gets the config file path, creating the directory if needed
    fn config_path() -> Option<PathBuf> {
        let config_dir = Self::config_dir()?;

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).ok()?;
        }

        Some(config_dir.join("config.json"))
    }

    /// Loads configuration from disk, then applies environment overrides
    pub fn load() -> Self {
        let mut config = Self::config_path()
            .filter(|path| path.exists())
            .and_then(|path| fs::read_to_string(&path).ok())
            .and_then(|content| match serde_json::from_str::<Self>(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!("Ignoring malformed config file: {}", e);
                    None
                }
            })
            .unwrap_or_default();

        config.apply_api_url_override(std::env::var(API_URL_ENV).ok());
        config
    }

    /// Replaces the backend URL when an override is set and non-empty
    pub fn apply_api_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            tracing::debug!("Using backend URL from {}: {}", API_URL_ENV, url);
            self.api_base_url = url.trim_end_matches('/').to_string();
        }
    }

    /// Saves configuration to disk
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Resolved SQLite token file
    pub fn token_db_path(&self) -> Option<PathBuf> {
        self.storage_path
            .clone()
            .or_else(|| Self::config_dir().map(|dir| dir.join("tokens.db")))
    }

    /// Opens the configured token store
    ///
    /// Falls back to memory storage when no SQLite path can be resolved.
    pub fn open_token_store(&self) -> Result<Arc<dyn TokenStore>, TokenStoreError> {
        match self.token_storage {
            TokenStorage::Memory => Ok(Arc::new(MemoryTokenStore::new())),
            TokenStorage::Keyring => Ok(Arc::new(KeyringTokenStore::new())),
            TokenStorage::Sqlite => match self.token_db_path() {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        let _ = fs::create_dir_all(parent);
                    }
                    Ok(Arc::new(SqliteTokenStore::open(path)?))
                }
                None => {
                    tracing::warn!("No token database path, keeping tokens in memory");
                    Ok(Arc::new(MemoryTokenStore::new()))
                }
            },
        }
    }
}
