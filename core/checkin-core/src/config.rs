//! Configuration loading for the check-in subsystem.
//!
//! Reads `~/.checkin/config.toml` (or an explicit path). A missing file means
//! defaults; a malformed file is an error so typos don't silently point the
//! scanner at the wrong backend.
//!
//! ```toml
//! base_url = "https://shop.example.com"
//!
//! [session]
//! primary_key = "storefront:auth"
//! legacy_keys = ["accessToken", "token"]
//! store_path = "/home/me/.checkin/storage.json"
//! ```

use std::env;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

pub const CONFIG_ENV: &str = "CHECKIN_CONFIG";
pub const BASE_URL_ENV: &str = "CHECKIN_BASE_URL";
const CONFIG_DIR: &str = ".checkin";
const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_PRIMARY_KEY: &str = "storefront:auth";
pub const DEFAULT_LEGACY_KEYS: [&str; 2] = ["accessToken", "token"];

/// Where the session resolver looks for the caller's credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionKeys {
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Bare-token keys consulted in order when the primary key is unusable.
    #[serde(default = "default_legacy_keys")]
    pub legacy_keys: Vec<String>,
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

impl Default for SessionKeys {
    fn default() -> Self {
        Self {
            primary_key: default_primary_key(),
            legacy_keys: default_legacy_keys(),
            store_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckinConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub session: SessionKeys,
}

impl Default for CheckinConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session: SessionKeys::default(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

fn default_legacy_keys() -> Vec<String> {
    DEFAULT_LEGACY_KEYS.iter().map(|key| key.to_string()).collect()
}

/// Returns the default config path (`~/.checkin/config.toml`).
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
    Ok(home.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Loads the config from `path`, `$CHECKIN_CONFIG`, or the default location,
/// then applies `$CHECKIN_BASE_URL`.
pub fn load_config(path: Option<PathBuf>) -> Result<CheckinConfig> {
    let config_path = match path.or_else(|| env::var(CONFIG_ENV).ok().map(PathBuf::from)) {
        Some(path) => path,
        None => default_config_path()?,
    };

    let mut config = if config_path.exists() {
        let content = fs_err::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        toml::from_str::<CheckinConfig>(&content).map_err(|source| ConfigError::Malformed {
            path: config_path.clone(),
            source,
        })?
    } else {
        CheckinConfig::default()
    };

    if let Ok(base_url) = env::var(BASE_URL_ENV) {
        if !base_url.trim().is_empty() {
            config.base_url = base_url.trim().to_string();
        }
    }

    Ok(config)
}
