// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::scheduler::DEFAULT_INTERVAL;

pub const ENV_CONFIG_PATH: &str = "FEEDSMITH_CONFIG";
pub const ENV_PORT: &str = "FEEDSMITH_PORT";
pub const ENV_DATABASE: &str = "FEEDSMITH_DATABASE";

pub const DEFAULT_PORT: u16 = 8082;
pub const DEFAULT_DATABASE: &str = "feedsmith.sqlite";

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_database() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Default polling interval in minutes.
    #[serde(default)]
    pub refresh_period: Option<u64>,
    /// Separate listener for Prometheus `/metrics`; off when unset.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            refresh_period: None,
            metrics_port: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

/// A source republished from an upstream RSS document.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    pub name: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    pub feed_url: String,
    #[serde(default)]
    pub interval_seconds: Option<u64>,
}

impl SourceConfig {
    pub fn interval(&self) -> Option<Duration> {
        self.interval_seconds
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }
}

impl AppConfig {
    /// Polling interval for sources that do not set their own.
    pub fn default_interval(&self) -> Duration {
        self.server
            .refresh_period
            .filter(|m| *m > 0)
            .map(|m| Duration::from_secs(m.saturating_mul(60)))
            .unwrap_or(DEFAULT_INTERVAL)
    }

    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, ext.as_str())
            .with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $FEEDSMITH_CONFIG
    /// 2) config/feedsmith.toml
    /// 3) config/feedsmith.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let toml_p = PathBuf::from("config/feedsmith.toml");
            let json_p = PathBuf::from("config/feedsmith.json");
            if toml_p.exists() {
                Self::load_from(&toml_p)?
            } else if json_p.exists() {
                Self::load_from(&json_p)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var(ENV_PORT) {
            self.server.port = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_PORT} is not a valid port: {raw}"))?;
        }
        if let Ok(raw) = std::env::var(ENV_DATABASE) {
            if !raw.trim().is_empty() {
                self.storage.database = PathBuf::from(raw.trim());
            }
        }
        Ok(())
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("invalid JSON config");
    }
    match toml::from_str(s) {
        Ok(cfg) => Ok(cfg),
        // Unknown extension: give JSON a chance before reporting the TOML error.
        Err(toml_err) if hint_ext != "toml" => {
            serde_json::from_str(s).map_err(|_| anyhow!(toml_err).context("invalid config"))
        }
        Err(toml_err) => Err(anyhow!(toml_err).context("invalid TOML config")),
    }
}
