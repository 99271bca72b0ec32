use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for bitsync
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// Bitbucket REST endpoint and credentials
    #[serde(default)]
    pub bitbucket: BitbucketConfig,

    /// Repository layout: directory names and recognized file sets
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Download behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bitbucket connection settings
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BitbucketConfig {
    /// Base URL of the REST API
    #[serde(default = "default_rest_base")]
    pub rest_base: String,

    /// API version segment appended to the base URL
    #[serde(default = "default_rest_version")]
    pub rest_version: String,

    /// Account name (falls back to BITBUCKET_USER)
    pub username: Option<String>,

    /// App password (falls back to BITBUCKET_PASSWORD)
    pub password: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// Where each category lives in the repository and which files count
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LayoutConfig {
    #[serde(default = "default_rules_directory")]
    pub rules_directory: String,

    #[serde(default = "default_database_connections_directory")]
    pub database_connections_directory: String,

    #[serde(default = "default_pages_directory")]
    pub pages_directory: String,

    /// Closed set of page filenames that are synced
    #[serde(default = "default_page_names")]
    pub page_names: Vec<String>,

    /// Closed set of database script roles
    #[serde(default = "default_database_scripts")]
    pub database_scripts: Vec<String>,
}

/// Download configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Entities downloaded at once per category
    #[serde(default = "default_entity_concurrency")]
    pub entity_concurrency: usize,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Output style: "compact", "pretty" or "full"
    #[serde(default = "default_log_format")]
    pub format: String, // "compact"
}

// Default value functions
fn default_rest_base() -> String {
    "https://api.bitbucket.org/".to_string()
}
fn default_rest_version() -> String {
    "1.0".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_rules_directory() -> String {
    "rules".to_string()
}
fn default_database_connections_directory() -> String {
    "database-connections".to_string()
}
fn default_pages_directory() -> String {
    "pages".to_string()
}
fn default_page_names() -> Vec<String> {
    [
        "password_reset.html",
        "password_reset.json",
        "guardian_multifactor.html",
        "guardian_multifactor.json",
        "login.html",
        "login.json",
        "error_page.html",
        "error_page.json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_database_scripts() -> Vec<String> {
    [
        "get_user",
        "create",
        "verify",
        "login",
        "remove",
        "change_password",
        "change_email",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_entity_concurrency() -> usize {
    2
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}

// Default implementations
impl Default for BitbucketConfig {
    fn default() -> Self {
        Self {
            rest_base: default_rest_base(),
            rest_version: default_rest_version(),
            username: None,
            password: None,
            timeout: default_timeout(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            rules_directory: default_rules_directory(),
            database_connections_directory: default_database_connections_directory(),
            pages_directory: default_pages_directory(),
            page_names: default_page_names(),
            database_scripts: default_database_scripts(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            entity_concurrency: default_entity_concurrency(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl BitbucketConfig {
    /// Full API root, e.g. `https://api.bitbucket.org/1.0/`
    pub fn api_root(&self) -> String {
        format!(
            "{}/{}/",
            self.rest_base.trim_end_matches('/'),
            self.rest_version.trim_matches('/')
        )
    }

    /// Resolve basic-auth credentials from the config or the environment
    pub fn credentials(&self) -> Option<(String, String)> {
        let username = self
            .username
            .clone()
            .or_else(|| std::env::var("BITBUCKET_USER").ok())
            .filter(|u| !u.is_empty())?;
        let password = self
            .password
            .clone()
            .or_else(|| std::env::var("BITBUCKET_PASSWORD").ok())
            .unwrap_or_default();
        Some((username, password))
    }
}

impl SyncConfig {
    /// Concurrency ceiling, never below one
    pub fn effective_concurrency(&self) -> usize {
        self.entity_concurrency.max(1)
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            config.save(&config_path)?;

            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_env()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("bitsync").join("config.yml"))
    }

    /// Expand environment variables in connection settings
    pub fn expand_env(&mut self) -> Result<()> {
        self.bitbucket.rest_base = shellexpand::full(&self.bitbucket.rest_base)
            .context("Failed to expand rest_base")?
            .into_owned();

        if let Some(username) = &self.bitbucket.username {
            self.bitbucket.username = Some(
                shellexpand::full(username)
                    .context("Failed to expand bitbucket username")?
                    .into_owned(),
            );
        }

        if let Some(password) = &self.bitbucket.password {
            self.bitbucket.password = Some(
                shellexpand::full(password)
                    .context("Failed to expand bitbucket password")?
                    .into_owned(),
            );
        }

        Ok(())
    }
}
