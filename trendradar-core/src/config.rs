//! Process configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an optional
//! TOML file named by `TRENDRADAR_CONFIG`, and environment variables. The
//! binary loads `.env` into the environment before calling [`AppConfig::load`].

use crate::error::ConfigError;
use crate::types::SortMode;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const CONFIG_PATH_ENV: &str = "TRENDRADAR_CONFIG";
pub const DATABASE_URL_ENV: &str = "TRENDRADAR_DATABASE_URL";
pub const FALLBACK_DATABASE_URL_ENV: &str = "DATABASE_URL";

pub const DEFAULT_DATABASE_URL: &str = "sqlite://trendradar.db";
pub const DEFAULT_USER_AGENT: &str = "trendradar/1.0 (educational project)";
pub const DEFAULT_BASE_URL: &str = "https://www.reddit.com";

const DEFAULT_SUBREDDITS: [&str; 8] = [
    "technology",
    "artificial",
    "MachineLearning",
    "dataisbeautiful",
    "python",
    "programming",
    "Futurology",
    "singularity",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub subreddits: Vec<String>,
    pub sort: SortMode,
    pub posts_per_subreddit: u32,
    pub poll_interval_minutes: u64,
    pub check_interval_seconds: u64,
    pub request_interval_seconds: u64,
    pub fetch_concurrency: usize,
    pub user_agent: String,
    pub base_url: String,
    pub request_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            subreddits: DEFAULT_SUBREDDITS.iter().map(|s| s.to_string()).collect(),
            sort: SortMode::New,
            posts_per_subreddit: 25,
            poll_interval_minutes: 60,
            check_interval_seconds: 60,
            request_interval_seconds: 2,
            fetch_concurrency: 1,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_seconds: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration for the running process.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load configuration reading variables only through `lookup`.
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_overrides(&lookup);
        config.validate()?;

        info!(
            "Configuration loaded: {} subreddits, every {} minutes",
            config.subreddits.len(),
            config.poll_interval_minutes
        );
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(DATABASE_URL_ENV).or_else(|| lookup(FALLBACK_DATABASE_URL_ENV));
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.database_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subreddits.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "at least one subreddit is required".to_string(),
            });
        }
        if let Some(bad) = self.subreddits.iter().find(|s| s.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "subreddits".to_string(),
                value: bad.clone(),
            });
        }
        if self.poll_interval_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_minutes".to_string(),
                value: "0".to_string(),
            });
        }
        if self.check_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "check_interval_seconds".to_string(),
                value: "0".to_string(),
            });
        }
        if self.fetch_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch_concurrency".to_string(),
                value: "0".to_string(),
            });
        }
        if self.posts_per_subreddit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "posts_per_subreddit".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes * 60)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_secs(self.request_interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
