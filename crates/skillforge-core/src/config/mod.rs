//! Configuration management with file persistence

use crate::domain::paths::PathOrder;
use crate::error::Error;
use crate::storage::{DatabaseConfig, default_database_path};
use crate::storage::database::DEFAULT_MAX_CONNECTIONS;
use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "SKILLFORGE_CONFIG_DIR";

/// Environment variable overriding `database.path`
pub const DATABASE_PATH_ENV: &str = "SKILLFORGE_DATABASE_PATH";

const KEYS: [&str; 3] = ["database.path", "database.max_connections", "paths.order"];

/// SkillForge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSection,
    pub paths: PathsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// Database file; `None` means the platform data directory
    pub path: Option<PathBuf>,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub order: PathOrder,
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var(CONFIG_DIR_ENV) {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("skillforge")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            // Return default config without creating file
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`, creating its directory
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.max_connections == 0 {
            return Err(Error::ConfigError(
                "database.max_connections must be at least 1".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// The database file to open, honouring `SKILLFORGE_DATABASE_PATH`
    pub fn database_path(&self) -> PathBuf {
        match env::var(DATABASE_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => self
                .database
                .path
                .clone()
                .unwrap_or_else(default_database_path),
        }
    }

    /// Database settings derived from this configuration
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::with_path(self.database_path())
            .max_connections(self.database.max_connections)
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "database.path" => Ok(match &self.database.path {
                Some(path) => path.display().to_string(),
                None => format!("(default: {})", default_database_path().display()),
            }),
            "database.max_connections" => Ok(self.database.max_connections.to_string()),
            "paths.order" => Ok(self.paths.order.as_str().to_string()),
            _ => Err(unknown_key(key).into()),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "database.path" => {
                let value = value.trim();
                self.database.path = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "database.max_connections" => {
                let max: u32 = value.parse().map_err(|_| {
                    Error::ConfigError(format!("Invalid max_connections value: {}", value))
                })?;
                if max == 0 {
                    return Err(Error::ConfigError(
                        "database.max_connections must be at least 1".to_string(),
                    )
                    .into());
                }
                self.database.max_connections = max;
            }
            "paths.order" => {
                self.paths.order = PathOrder::parse(value).ok_or_else(|| {
                    Error::ConfigError(format!(
                        "Invalid path order: {}. Valid options: fundamentals_first, target_first",
                        value
                    ))
                })?;
            }
            _ => return Err(unknown_key(key).into()),
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }
}

fn unknown_key(key: &str) -> Error {
    Error::ConfigError(format!("Unknown configuration key: {}", key))
}
