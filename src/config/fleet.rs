// src/config/fleet.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::SensorConfig;
use crate::error::ConfigError;

pub const ENV_FLEET_CONFIG_PATH: &str = "FLEET_CONFIG_PATH";
pub const ENV_FLEET_API_ADDR: &str = "FLEET_API_ADDR";

fn default_subscribe_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    100
}
fn default_backoff_max_ms() -> u64 {
    2_000
}

/// Retry policy used when attaching to a newly discovered source queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_subscribe_attempts")]
    pub subscribe_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            subscribe_attempts: default_subscribe_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    /// Bind address for the introspection routes; disabled when absent.
    #[serde(default)]
    pub api_addr: Option<String>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            sensors: vec![SensorConfig::default()],
            coordinator: CoordinatorConfig::default(),
            api_addr: None,
        }
    }
}

impl FleetConfig {
    /// Load from an explicit path. TOML or JSON, chosen by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading fleet config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: FleetConfig = match ext.as_str() {
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?,
            _ => toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?,
        };
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $FLEET_CONFIG_PATH
    /// 2) config/fleet.toml
    /// 3) config/fleet.json
    /// 4) built-in default (one sensor)
    ///
    /// `$FLEET_API_ADDR` overrides `api_addr` in every case.
    pub fn load_default() -> Result<Self> {
        let mut cfg = Self::load_file_default()?;
        if let Ok(addr) = std::env::var(ENV_FLEET_API_ADDR) {
            let addr = addr.trim();
            if !addr.is_empty() {
                cfg.api_addr = Some(addr.to_string());
            }
        }
        Ok(cfg)
    }

    fn load_file_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_FLEET_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_FLEET_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in ["config/fleet.toml", "config/fleet.json"] {
            let p = PathBuf::from(candidate);
            if p.exists() {
                return Self::load_from(&p);
            }
        }
        Ok(Self::default())
    }

    /// Validate every sensor and reject duplicate names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for s in &self.sensors {
            s.validate()?;
            if !seen.insert(s.name.as_str()) {
                return Err(ConfigError::DuplicateName(s.name.clone()));
            }
        }
        Ok(())
    }
}
