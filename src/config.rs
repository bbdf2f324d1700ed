//! TOML configuration parsing and validation.
//!
//! Configuration is loaded once at startup by [`load_config`] and passed
//! explicitly to every component; nothing reads it again afterwards. The
//! upstream API key is resolved here too: `upstream.api_key` wins, otherwise
//! the `CAT_API_KEY` environment variable is used.

use anyhow::{Context, Result};
use reqwest::header::HeaderValue;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable consulted when `upstream.api_key` is not set.
pub const API_KEY_ENV: &str = "CAT_API_KEY";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            limit: default_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.thecatapi.com/v1".to_string()
}
fn default_limit() -> u32 {
    25
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImagesConfig {
    #[serde(default = "default_images_dir")]
    pub dir: PathBuf,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: default_images_dir(),
        }
    }
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("./CatImages")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Config {
    /// A config pointing at the given database with every other section
    /// at its defaults. Used by tests and embedders.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            upstream: UpstreamConfig::default(),
            images: ImagesConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;

    if config.upstream.api_key.is_none() {
        config.upstream.api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty());
        check_api_key(&config.upstream)
            .with_context(|| format!("{} is not usable as an API key", API_KEY_ENV))?;
    }

    Ok(config)
}

/// The key is sent verbatim as the `x-api-key` header, so it must be a
/// valid header value (visible ASCII, no control characters).
fn check_api_key(upstream: &UpstreamConfig) -> Result<()> {
    if let Some(key) = &upstream.api_key {
        if HeaderValue::from_str(key).is_err() {
            anyhow::bail!("upstream.api_key contains characters not allowed in an HTTP header");
        }
    }
    Ok(())
}

/// Parses and validates configuration text without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.upstream.base_url.trim().is_empty() {
        anyhow::bail!("upstream.base_url must not be empty");
    }

    if !(1..=100).contains(&config.upstream.limit) {
        anyhow::bail!("upstream.limit must be in [1, 100]");
    }

    if config.upstream.timeout_secs == 0 {
        anyhow::bail!("upstream.timeout_secs must be > 0");
    }

    if config.images.dir.as_os_str().is_empty() {
        anyhow::bail!("images.dir must not be empty");
    }

    check_api_key(&config.upstream)?;

    Ok(config)
}
