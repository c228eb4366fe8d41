// src/config.rs

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::resolver::HickoryLookup;
use crate::search::DEFAULT_BASE_URL;

/// Placeholder written into freshly created config files
pub const API_KEY_PLACEHOLDER: &str = "CHANGE_ME";
const DEFAULT_CONFIG_FILE: &str = ".certsio.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// 0 fetches every page
    #[serde(default)]
    pub max_pages: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_max_retries() -> u32 { 3 }
fn default_search_timeout() -> u64 { 15 }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_pages: 0,
            max_retries: default_max_retries(),
            timeout_secs: default_search_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResolverConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Tries per nameserver query
    #[serde(default = "default_attempts")]
    pub attempts: usize,
    #[serde(default = "default_resolver_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_nameservers")]
    pub nameservers: Vec<String>,
}

fn default_workers() -> usize { 10 }
fn default_attempts() -> usize { 1 }
fn default_resolver_timeout() -> u64 { 5 }

/// Cloudflare, Google, Quad9, Yandex and OpenDNS, primary and secondary
fn default_nameservers() -> Vec<String> {
    [
        "1.1.1.1:53",
        "1.0.0.1:53",
        "8.8.8.8:53",
        "8.8.4.4:53",
        "9.9.9.9:53",
        "9.9.9.10:53",
        "77.88.8.8:53",
        "77.88.8.1:53",
        "208.67.222.222:53",
        "208.67.220.220:53",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            attempts: default_attempts(),
            timeout_secs: default_resolver_timeout(),
            nameservers: default_nameservers(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_base_url() -> String { DEFAULT_BASE_URL.to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: API_KEY_PLACEHOLDER.to_string(),
            base_url: default_base_url(),
            search: SearchConfig::default(),
            resolver: ResolverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&contents)?;
        Ok(cfg)
    }

    /// Write a config with the placeholder API key
    pub fn write_default(path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(&Config::default())?;
        fs::write(path, contents)
            .with_context(|| format!("couldn't create config file {}", path.display()))?;
        Ok(())
    }

    /// Load `path`, creating it first if it does not exist.
    ///
    /// A freshly created file still holds the placeholder key, so this
    /// returns an error asking the user to fill it in.
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            Self::write_default(path)?;
            anyhow::bail!(
                "created config file {}; please update it with your API key",
                path.display()
            );
        }
        Self::from_file(path).with_context(|| format!("couldn't read config file {}", path.display()))
    }

    /// `$HOME/.certsio.toml`
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .context("config err: cannot determine home directory")?;
        Ok(PathBuf::from(home).join(DEFAULT_CONFIG_FILE))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_search()?;
        self.validate_resolver()
    }

    /// Settings needed to talk to the search API
    pub fn validate_search(&self) -> anyhow::Result<()> {
        if self.api_key.trim().is_empty() || self.api_key == API_KEY_PLACEHOLDER {
            anyhow::bail!("please update the config file with your API key");
        }

        url::Url::parse(&self.base_url)
            .with_context(|| format!("invalid base_url: {}", self.base_url))?;

        Ok(())
    }

    /// Settings needed for DNS resolution; no API key required
    pub fn validate_resolver(&self) -> anyhow::Result<()> {
        if self.resolver.workers == 0 {
            anyhow::bail!("resolver.workers must be greater than 0");
        }

        HickoryLookup::parse_nameservers(&self.resolver.nameservers)?;

        Ok(())
    }
}
