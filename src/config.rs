use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{CivicError, Result};

#[derive(Deserialize, Serialize, Default, Debug, PartialEq)]
pub struct Config {
    /// Realtime database root, e.g. `https://<project>-default-rtdb.<region>.firebasedatabase.app`
    pub database_url: Option<String>,
    /// Web API key of the project, used for sign-in.
    pub api_key: Option<String>,
    /// Pre-filled address for `civic login`.
    pub email: Option<String>,
    /// Pincode used by `worker create` when none is given.
    pub default_pincode: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents =
            std::fs::read_to_string(config_path).map_err(|e| CivicError::ConfigRead {
                path: config_path.to_path_buf(),
                source: e,
            })?;

        toml::from_str(&contents).map_err(|e| CivicError::ConfigParse {
            path: config_path.to_path_buf(),
            source: e,
        })
    }

    pub fn config_path() -> Result<PathBuf> {
        ProjectDirs::from("", "", "civic")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or(CivicError::NoConfigDir)
    }

    pub fn session_path() -> Result<PathBuf> {
        Self::config_path().map(|p| p.with_file_name("session.json"))
    }

    /// Get database URL with env var taking precedence over config file
    pub fn database_url(&self) -> Result<String> {
        env_or("CIVIC_DATABASE_URL", self.database_url.as_ref())
            .ok_or(CivicError::MissingDatabaseUrl)
    }

    /// Get API key with env var taking precedence over config file
    pub fn api_key(&self) -> Result<String> {
        env_or("CIVIC_API_KEY", self.api_key.as_ref()).ok_or(CivicError::MissingApiKey)
    }

    /// Get pincode, preferring explicit argument over default
    pub fn resolve_pincode(&self, explicit: Option<&str>) -> Option<String> {
        explicit
            .map(String::from)
            .or_else(|| self.default_pincode.clone())
    }
}

fn env_or(var: &str, fallback: Option<&String>) -> Option<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| fallback.cloned())
}
