//! Configuration loader and validator for the studio CLI.
//!
//! The YAML file carries deployment facts (where local state lives, which
//! storage bucket to upload into). Per-user connection settings are kept in
//! the local state store instead, see [`crate::settings`].
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub feed: Feed,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Object storage used for product images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Storage {
    pub bucket: String,
    pub category: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            bucket: "ad-assets".into(),
            category: "product".into(),
        }
    }
}

/// Feed defaults applied when the user has not picked a table yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feed {
    pub default_table: String,
}

impl Default for Feed {
    fn default() -> Self {
        Self {
            default_table: crate::model::DEFAULT_TABLE.into(),
        }
    }
}

fn default_user_agent() -> String {
    "adgen-studio/0.1".into()
}

impl App {
    /// `data_dir` with a leading `~/` expanded against `$HOME`.
    pub fn resolved_data_dir(&self) -> String {
        match self.data_dir.strip_prefix("~/") {
            Some(rest) => match std::env::var("HOME") {
                Ok(home) => format!("{}/{}", home.trim_end_matches('/'), rest),
                Err(_) => self.data_dir.clone(),
            },
            None => self.data_dir.clone(),
        }
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.app.resolved_data_dir())
    }

    /// Default local state database inside the data directory.
    pub fn database_url(&self) -> String {
        format!("sqlite://{}/studio.db", self.app.resolved_data_dir())
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.user_agent.trim().is_empty() {
        return Err(ConfigError::Invalid("app.user_agent must be non-empty"));
    }
    if cfg.storage.bucket.trim().is_empty() {
        return Err(ConfigError::Invalid("storage.bucket must be non-empty"));
    }
    if cfg.storage.category.trim().is_empty() || cfg.storage.category.contains('/') {
        return Err(ConfigError::Invalid(
            "storage.category must be a non-empty path segment",
        ));
    }
    if cfg.feed.default_table.trim().is_empty() {
        return Err(ConfigError::Invalid("feed.default_table must be non-empty"));
    }
    Ok(())
}

/// Returns the documented example YAML content.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  user_agent: "adgen-studio/0.1"

storage:
  bucket: "ad-assets"
  category: "product"

feed:
  default_table: "video_posts"
"#
}
