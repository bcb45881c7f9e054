//! # Configuration Management Module
//!
//! TOML configuration for the client and its local collaborators.
//!
//! ## Configuration Structure
//!
//! - [`GameConfig`] - display name and the scene opened after login
//! - [`StorageConfig`] - where profiles and accounts are kept
//! - [`SyncConfig`] - profile sync tuning
//! - [`LoggingConfig`] - log level and log files
//! - [`SecurityConfig`] - password policy and Argon2 parameters
//! - [`ExploreConfig`] - reward tables for explore sites
//!
//! ## Usage
//!
//! ```rust,no_run
//! use playerstats::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("config.toml").await?;
//!     let config = Config::load("config.toml").await?;
//!     println!("Profiles at: {}", config.storage.profiles_path().display());
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [game]
//! name = "Player Stats"
//! start_scene = "home"
//!
//! [storage]
//! data_dir = "./data"
//! backend = "sled"
//!
//! [sync]
//! cache_max_age_secs = 30
//!
//! [[explore.sites]]
//! name = "forest"
//! xp = 15
//! gold = 10
//! diamond = 0
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

use crate::app::Scene;
use crate::identity::local::DEFAULT_MIN_PASSWORD_LENGTH;
use crate::progression::ProgressionDelta;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub game: GameConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
    pub security: Option<SecurityConfig>,
    #[serde(default)]
    pub explore: ExploreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub name: String,
    /// Scene opened after a successful login.
    #[serde(default = "default_start_scene")]
    pub start_scene: Scene,
}

fn default_start_scene() -> Scene {
    Scene::Home
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Durable sled databases under `data_dir`.
    #[default]
    Sled,
    /// Volatile in-process store; profiles vanish on exit.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    #[serde(default)]
    pub backend: StorageBackend,
    /// Optional override for the profile database path; defaults to `<data_dir>/profiles`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles_db_path: Option<String>,
    /// Optional override for the account database path; defaults to `<data_dir>/accounts`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts_db_path: Option<String>,
}

impl StorageConfig {
    pub fn profiles_path(&self) -> PathBuf {
        self.profiles_db_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&self.data_dir).join("profiles"))
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.accounts_db_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&self.data_dir).join("accounts"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds during which the session copy of a profile is trusted without a reload.
    pub cache_max_age_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_max_age_secs: 30,
        }
    }
}

impl SyncConfig {
    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    /// Receives sign-in, sign-up and rename events (log target `security`).
    #[serde(default)]
    pub security_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Argon2Config {
    #[serde(default)]
    pub memory_kib: Option<u32>,
    #[serde(default)]
    pub time_cost: Option<u32>,
    #[serde(default)]
    pub parallelism: Option<u32>,
}

impl Argon2Config {
    /// Build Argon2 params, falling back to library defaults for unset values.
    pub fn params(&self) -> Result<argon2::Params> {
        let defaults = argon2::Params::default();
        argon2::Params::new(
            self.memory_kib.unwrap_or(defaults.m_cost()),
            self.time_cost.unwrap_or(defaults.t_cost()),
            self.parallelism.unwrap_or(defaults.p_cost()),
            None,
        )
        .map_err(|e| anyhow!("Invalid argon2 parameters: {}", e))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
    #[serde(default)]
    pub argon2: Option<Argon2Config>,
}

fn default_min_password_length() -> usize {
    DEFAULT_MIN_PASSWORD_LENGTH
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            argon2: None,
        }
    }
}

/// A place the player can explore and the reward it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExploreSite {
    pub name: String,
    #[serde(default)]
    pub xp: i64,
    #[serde(default)]
    pub gold: i64,
    #[serde(default)]
    pub diamond: i64,
}

impl ExploreSite {
    pub fn reward(&self) -> ProgressionDelta {
        ProgressionDelta::new(self.xp, self.gold, self.diamond)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExploreConfig {
    #[serde(default)]
    pub sites: Vec<ExploreSite>,
}

impl ExploreConfig {
    /// Case-insensitive lookup by site name.
    pub fn site(&self, name: &str) -> Option<&ExploreSite> {
        self.sites
            .iter()
            .find(|site| site.name.eq_ignore_ascii_case(name.trim()))
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject reward tables the progression engine would refuse anyway.
    pub fn validate(&self) -> Result<()> {
        for site in &self.explore.sites {
            if site.name.trim().is_empty() {
                return Err(anyhow!("Explore site with empty name"));
            }
            if site.xp < 0 || site.gold < 0 || site.diamond < 0 {
                return Err(anyhow!(
                    "Explore site '{}' has a negative reward",
                    site.name
                ));
            }
        }
        if let Some(argon) = self.security.as_ref().and_then(|s| s.argon2.as_ref()) {
            argon.params()?;
        }
        Ok(())
    }

    pub fn min_password_length(&self) -> usize {
        self.security
            .as_ref()
            .map(|s| s.min_password_length)
            .unwrap_or(DEFAULT_MIN_PASSWORD_LENGTH)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            game: GameConfig {
                name: "Player Stats".to_string(),
                start_scene: Scene::Home,
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
                backend: StorageBackend::Sled,
                profiles_db_path: None,
                accounts_db_path: None,
            },
            sync: SyncConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("playerstats.log".to_string()),
                security_file: Some("playerstats-security.log".to_string()),
            },
            security: Some(SecurityConfig::default()),
            explore: ExploreConfig {
                sites: vec![
                    ExploreSite {
                        name: "forest".to_string(),
                        xp: 15,
                        gold: 10,
                        diamond: 0,
                    },
                    ExploreSite {
                        name: "cave".to_string(),
                        xp: 25,
                        gold: 5,
                        diamond: 1,
                    },
                    ExploreSite {
                        name: "ruins".to_string(),
                        xp: 40,
                        gold: 20,
                        diamond: 2,
                    },
                ],
            },
        }
    }
}
