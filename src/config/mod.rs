//! Configuration management for sluice.
//!
//! Configuration is read from `~/.config/sluice/config.toml` unless a path is
//! given on the command line. If the default file doesn't exist, one with
//! comments is created.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::session::RetryPolicy;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub twitter: TwitterConfig,
    pub remote: RemoteConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    #[default]
    Timeline,
    Search,
}

/// Settings for the social platform source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    /// Accounts to ingest, processed in this order
    pub accounts: Vec<String>,

    /// Login identity; falls back to `TWITTER_USERNAME`
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,

    /// Saved cookies as a JSON array; falls back to `TWITTER_COOKIES`
    pub cookies: Option<String>,

    pub fetch_mode: FetchMode,

    /// Extra search terms appended to `from:<account>` queries
    pub search_terms: Option<String>,

    /// Maximum records scanned per account in timeline mode (default: 200)
    pub max_scan: usize,

    /// Maximum pages per account in search mode (default: 5)
    pub max_pages: usize,

    /// Records requested per search page (default: 50)
    pub page_size: usize,

    /// Deadline for reshare/quote original lookups (default: 15)
    pub lookup_timeout_secs: u64,

    /// TTL of per-account day buckets (default: 300)
    pub backfill_ttl_secs: u64,

    /// TTL of cached session cookies (default: 86400)
    pub credential_ttl_secs: u64,

    /// TTL of cached profiles (default: 86400)
    pub profile_ttl_secs: u64,

    pub auth_max_attempts: u32,
    pub auth_retry_delay_secs: u64,

    /// How far back continuous mode looks when an account has no cursor
    pub poll_lookback_secs: u64,

    /// Cache records from neighbouring days seen while backfilling
    pub cache_adjacent_days: bool,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            username: None,
            password: None,
            email: None,
            cookies: None,
            fetch_mode: FetchMode::Timeline,
            search_terms: None,
            max_scan: 200,
            max_pages: 5,
            page_size: 50,
            lookup_timeout_secs: 15,
            backfill_ttl_secs: 300,
            credential_ttl_secs: 86_400,
            profile_ttl_secs: 86_400,
            auth_max_attempts: 5,
            auth_retry_delay_secs: 2,
            poll_lookback_secs: 86_400,
            cache_adjacent_days: true,
        }
    }
}

impl TwitterConfig {
    /// Fill unset secrets from the `TWITTER_*` environment variables.
    pub fn with_env_fallbacks(mut self) -> Self {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        self.username = self.username.or_else(|| env("TWITTER_USERNAME"));
        self.password = self.password.or_else(|| env("TWITTER_PASSWORD"));
        self.email = self.email.or_else(|| env("TWITTER_EMAIL"));
        self.cookies = self.cookies.or_else(|| env("TWITTER_COOKIES"));
        self
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn backfill_ttl(&self) -> Duration {
        Duration::from_secs(self.backfill_ttl_secs)
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_ttl_secs)
    }

    pub fn profile_ttl(&self) -> Duration {
        Duration::from_secs(self.profile_ttl_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.auth_max_attempts,
            Duration::from_secs(self.auth_retry_delay_secs),
        )
    }
}

/// Where the platform bridge lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787/".to_string(),
            timeout_secs: 30,
            user_agent: "sluice/0.1.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Cache database path (default: `<data dir>/sluice/cache.db`)
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from `path`, or from the default path.
    ///
    /// A missing default file is created with comments; a missing explicit
    /// path is an error. Missing fields use default values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let p = Self::default_config_path()?;
                if !p.exists() {
                    Self::create_default_config(&p)?;
                    return Ok(Self::default().with_env_fallbacks());
                }
                p
            }
        };

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })?;

        Ok(config.with_env_fallbacks())
    }

    fn with_env_fallbacks(mut self) -> Self {
        self.twitter = self.twitter.with_env_fallbacks();
        self
    }

    /// Get the default config file path: `~/.config/sluice/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("sluice").join("config.toml"))
    }

    fn create_default_config(path: &PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.clone(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> String {
        r##"# sluice configuration
#
# Secrets left unset here are read from TWITTER_USERNAME, TWITTER_PASSWORD,
# TWITTER_EMAIL and TWITTER_COOKIES.

[twitter]
# Accounts to ingest, processed one after another
accounts = []

# "timeline" scans each account's timeline, "search" runs from:<account> queries
fetch_mode = "timeline"

# search_terms = "-filter:replies"

# Budgets
max_scan = 200
max_pages = 5
page_size = 50

# Reshare/quote original lookups give up after this many seconds
lookup_timeout_secs = 15

# Cache lifetimes in seconds
backfill_ttl_secs = 300
credential_ttl_secs = 86400
profile_ttl_secs = 86400

# Authentication retry
auth_max_attempts = 5
auth_retry_delay_secs = 2

# Continuous mode: look back this far for accounts without a cursor
poll_lookback_secs = 86400

cache_adjacent_days = true

[remote]
base_url = "http://127.0.0.1:8787/"
timeout_secs = 30
user_agent = "sluice/0.1.0"

[store]
# path = "/var/lib/sluice/cache.db"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
