use crate::relay::{RelayEndpoint, default_relays, default_upstreams};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

/// Whether upstreams can be called directly or only through relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    #[default]
    Direct,
    Relayed,
}

impl ExecutionContext {
    pub fn is_direct(&self) -> bool {
        matches!(self, ExecutionContext::Direct)
    }
}

fn default_yahoo_timeout() -> u64 {
    15
}

fn default_finnhub_url() -> String {
    "https://finnhub.io".to_string()
}

fn default_finnhub_timeout() -> u64 {
    8
}

fn default_backup_b_url() -> String {
    "https://api.marketdata.app".to_string()
}

fn default_batch_timeout() -> u64 {
    15
}

fn default_ttl() -> u64 {
    30
}

fn default_capacity() -> usize {
    100
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    #[serde(default = "default_upstreams")]
    pub base_urls: Vec<String>,
    #[serde(default = "default_yahoo_timeout")]
    pub timeout_secs: u64,
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        YahooProviderConfig {
            base_urls: default_upstreams(),
            timeout_secs: default_yahoo_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FinnhubProviderConfig {
    #[serde(default = "default_finnhub_url")]
    pub base_url: String,
    /// Falls back to the key stored in preferences when absent.
    pub api_key: Option<String>,
    #[serde(default = "default_finnhub_timeout")]
    pub timeout_secs: u64,
}

impl Default for FinnhubProviderConfig {
    fn default() -> Self {
        FinnhubProviderConfig {
            base_url: default_finnhub_url(),
            api_key: None,
            timeout_secs: default_finnhub_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackupBProviderConfig {
    #[serde(default = "default_backup_b_url")]
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for BackupBProviderConfig {
    fn default() -> Self {
        BackupBProviderConfig {
            base_url: default_backup_b_url(),
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub yahoo: YahooProviderConfig,
    #[serde(default)]
    pub finnhub: FinnhubProviderConfig,
    #[serde(default)]
    pub backup_b: BackupBProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: default_ttl(),
            capacity: default_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub execution: ExecutionContext,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default = "default_relays")]
    pub relays: Vec<RelayEndpoint>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            execution: ExecutionContext::default(),
            providers: ProvidersConfig::default(),
            relays: default_relays(),
            cache: CacheConfig::default(),
            batch_timeout_secs: default_batch_timeout(),
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the config at the default location, or built-in defaults when no file exists yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "quotefeed", "quotefeed")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "quotefeed", "quotefeed")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}
